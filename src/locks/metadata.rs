//! Lock metadata structures and utilities.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Holder record written into a degraded-mode lock artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMetadata {
    /// Owner of the lock (e.g., `user@HOST`).
    pub owner: String,

    /// Process ID of the lock holder.
    pub pid: u32,

    /// Timestamp when the lock was created (RFC3339).
    pub created_at: DateTime<Utc>,

    /// The store operation holding the lock (load/save).
    #[serde(default)]
    pub action: String,
}

impl LockMetadata {
    /// Create metadata for the current process with the current timestamp.
    pub fn new(action: &str) -> Self {
        Self {
            owner: get_owner_string(),
            pid: std::process::id(),
            created_at: Utc::now(),
            action: action.to_string(),
        }
    }

    /// Read metadata from an artifact, returning `None` for anything that is
    /// missing, partially written, or not parseable.
    pub fn read_lenient<P: AsRef<Path>>(path: P) -> Option<Self> {
        let content = fs::read_to_string(path.as_ref()).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Serialize lock metadata to JSON string.
    pub fn to_json(&self) -> String {
        // Plain struct of strings and integers; serialization cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Calculate the age of the lock.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created_at)
    }

    /// Age as a std duration; timestamps in the future count as zero.
    pub fn age_std(&self) -> std::time::Duration {
        self.age().to_std().unwrap_or_default()
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();

        if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds.max(0))
        }
    }

    /// Whether this record describes a lock taken by the current process.
    pub fn is_current_process(&self) -> bool {
        self.pid == std::process::id()
    }
}

/// Get the owner string for lock metadata.
pub(crate) fn get_owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
