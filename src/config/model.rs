//! StoreConfig struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for a todo store.
///
/// This struct represents the contents of `.flywheel.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
/// Durations are given in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    // =========================================================================
    // Store settings
    // =========================================================================
    /// Path of the store file (default: ".todo.json").
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Files larger than this are refused before parsing.
    #[serde(default = "default_max_store_bytes")]
    pub max_store_bytes: u64,

    /// Keep the previous encoding in `{store_path}.bak` on every save.
    #[serde(default)]
    pub backup: bool,

    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Seconds to wait for the lock before failing.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: f64,

    /// Seconds between lock attempts.
    #[serde(default = "default_lock_poll_interval")]
    pub lock_poll_interval: f64,

    /// Seconds after which a degraded lock artifact is reclaimed.
    #[serde(default = "default_stale_lock_threshold")]
    pub stale_lock_threshold: f64,

    /// Fail instead of falling back to degraded locking.
    #[serde(default)]
    pub strict_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            max_store_bytes: default_max_store_bytes(),
            backup: false,
            lock_timeout: default_lock_timeout(),
            lock_poll_interval: default_lock_poll_interval(),
            stale_lock_threshold: default_stale_lock_threshold(),
            strict_mode: false,
        }
    }
}
