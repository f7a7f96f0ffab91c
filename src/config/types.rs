//! Configuration types and defaults for flywheel.
//!
//! This module defines enums, constants, and default value functions
//! used by the StoreConfig struct.

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".flywheel.yaml";

/// Overrides `store_path`.
pub const ENV_DB: &str = "FLYWHEEL_DB";

/// Enables `backup` when set to `1` or `true`.
pub const ENV_BACKUP: &str = "FLYWHEEL_BACKUP";

/// Enables `strict_mode` when set to `1` or `true`.
pub const ENV_STRICT_LOCKING: &str = "FLYWHEEL_STRICT_LOCKING";

pub fn default_store_path() -> String {
    ".todo.json".to_string()
}

pub fn default_lock_timeout() -> f64 {
    30.0
}

pub fn default_lock_poll_interval() -> f64 {
    0.1
}

pub fn default_stale_lock_threshold() -> f64 {
    300.0
}

/// 10 MiB.
pub fn default_max_store_bytes() -> u64 {
    10 * 1024 * 1024
}

/// Interpret an environment flag value (`1`/`true`, case-insensitive).
pub fn parse_env_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true")
}
