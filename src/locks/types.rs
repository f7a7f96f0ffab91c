//! Lock type definitions and information structures.

use super::metadata::LockMetadata;
use super::reclaim::StaleVerdict;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Requested access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockIntent {
    /// Single writer; excludes every other holder.
    Exclusive,
    /// Concurrent readers. Degraded mode treats this as exclusive.
    Shared,
}

impl LockIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockIntent::Exclusive => "exclusive",
            LockIntent::Shared => "shared",
        }
    }
}

/// Locking strategy, chosen once per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    /// The platform's file lock (`flock` on Unix, `LockFileEx` on Windows).
    Native,
    /// Create-new lock artifact next to the store file, with stale reclaim.
    Degraded,
}

static NATIVE_AVAILABLE: OnceLock<bool> = OnceLock::new();

impl LockBackend {
    /// Detect the best backend for this platform. The probe runs once per process.
    pub fn detect() -> Self {
        let available = *NATIVE_AVAILABLE.get_or_init(|| {
            let available = cfg!(any(unix, windows));
            if !available {
                tracing::warn!("native file locking unavailable; using degraded lock files");
            }
            available
        });
        if available {
            LockBackend::Native
        } else {
            LockBackend::Degraded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockBackend::Native => "native",
            LockBackend::Degraded => "degraded",
        }
    }
}

/// Information about a lock currently present on disk.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// Which primitive holds the lock.
    pub backend: LockBackend,

    /// Holder metadata (degraded artifacts only, when readable).
    pub metadata: Option<LockMetadata>,

    /// Staleness assessment (degraded artifacts only).
    pub verdict: Option<StaleVerdict>,
}

impl LockInfo {
    pub fn is_stale(&self) -> bool {
        self.verdict.as_ref().is_some_and(StaleVerdict::is_stale)
    }
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}", self.path.display(), self.backend.as_str())?;
        if let Some(meta) = &self.metadata {
            write!(
                f,
                ", owner: {}, pid: {}, age: {}, action: {}",
                meta.owner,
                meta.pid,
                meta.age_string(),
                meta.action
            )?;
        }
        match &self.verdict {
            Some(verdict) if verdict.is_stale() => write!(f, ", STALE: {})", verdict),
            _ => write!(f, ")"),
        }
    }
}
