//! Config loading, validation, and override operations.

use super::model::StoreConfig;
use super::types::{DEFAULT_CONFIG_FILE, ENV_BACKUP, ENV_DB, ENV_STRICT_LOCKING, parse_env_flag};
use crate::error::{FlywheelError, Result};
use crate::locks::LockSettings;
use std::path::{Path, PathBuf};
use std::time::Duration;

impl StoreConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(StoreConfig)` - Successfully loaded and validated config
    /// * `Err(FlywheelError::Config)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            FlywheelError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as a map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: StoreConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FlywheelError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| FlywheelError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `store_path` must be non-empty
    /// - `lock_timeout`, `lock_poll_interval`, `stale_lock_threshold` must be finite and positive
    /// - `max_store_bytes` must be positive
    pub fn validate(&self) -> Result<()> {
        if self.store_path.trim().is_empty() {
            return Err(FlywheelError::Config(
                "store_path must not be empty".to_string(),
            ));
        }

        for (name, value) in [
            ("lock_timeout", self.lock_timeout),
            ("lock_poll_interval", self.lock_poll_interval),
            ("stale_lock_threshold", self.stale_lock_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(FlywheelError::Config(format!(
                    "{} must be a positive number of seconds (found {})",
                    name, value
                )));
            }
        }

        if self.max_store_bytes == 0 {
            return Err(FlywheelError::Config(
                "max_store_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply `FLYWHEEL_*` environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB)
            && !db.trim().is_empty()
        {
            self.store_path = db;
        }
        if let Some(value) = lookup(ENV_BACKUP) {
            self.backup = parse_env_flag(&value);
        }
        if let Some(value) = lookup(ENV_STRICT_LOCKING) {
            self.strict_mode = parse_env_flag(&value);
        }
    }

    /// Build the effective config: defaults, then the YAML file, then the
    /// environment, then `db_override`.
    ///
    /// The YAML file is `explicit` if given (it must exist), otherwise
    /// `.flywheel.yaml` in `cwd` when present.
    pub fn resolve(explicit: Option<&Path>, cwd: &Path, db_override: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let candidate = cwd.join(DEFAULT_CONFIG_FILE);
                if candidate.is_file() {
                    Self::load(&candidate)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env();
        if let Some(db) = db_override {
            config.store_path = db.to_string_lossy().into_owned();
        }

        config.validate()?;
        tracing::debug!(
            store_path = %config.store_path,
            strict = config.strict_mode,
            "resolved configuration"
        );
        Ok(config)
    }

    /// The store path, relative paths taken against `cwd`.
    pub fn store_path_in(&self, cwd: &Path) -> PathBuf {
        let path = Path::new(&self.store_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        seconds(self.lock_timeout)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        seconds(self.lock_poll_interval)
    }

    pub fn stale_lock_threshold(&self) -> Duration {
        seconds(self.stale_lock_threshold)
    }

    pub fn lock_settings(&self) -> LockSettings {
        LockSettings {
            timeout: self.lock_timeout(),
            poll_interval: self.lock_poll_interval(),
            stale_threshold: self.stale_lock_threshold(),
            strict: self.strict_mode,
        }
    }
}

// Validated values are positive and finite; absurdly large ones saturate.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}
