//! Tests for config functionality.

use crate::config::types::{ENV_BACKUP, ENV_DB, ENV_STRICT_LOCKING, parse_env_flag};
use crate::config::StoreConfig;
use crate::error::FlywheelError;
use serial_test::serial;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = StoreConfig::default();

    assert_eq!(config.store_path, ".todo.json");
    assert_eq!(config.lock_timeout, 30.0);
    assert_eq!(config.lock_poll_interval, 0.1);
    assert_eq!(config.stale_lock_threshold, 300.0);
    assert!(!config.strict_mode);
    assert_eq!(config.max_store_bytes, 10 * 1024 * 1024);
    assert!(!config.backup);
    config.validate().unwrap();
}

#[test]
fn test_parse_minimal_yaml() {
    let config = StoreConfig::from_yaml("").unwrap();
    assert_eq!(config, StoreConfig::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
store_path: /var/lib/todo.json
lock_timeout: 2
"#;
    let config = StoreConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.store_path, "/var/lib/todo.json");
    assert_eq!(config.lock_timeout(), Duration::from_secs(2));

    // Unspecified values should use defaults
    assert_eq!(config.lock_poll_interval(), Duration::from_millis(100));
    assert_eq!(config.stale_lock_threshold(), Duration::from_secs(300));
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
store_path: todos.json
lock_timeout: 5.5
lock_poll_interval: 0.25
stale_lock_threshold: 60
strict_mode: true
max_store_bytes: 4096
backup: true
"#;
    let config = StoreConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.store_path, "todos.json");
    assert_eq!(config.lock_timeout(), Duration::from_millis(5500));
    assert_eq!(config.lock_poll_interval(), Duration::from_millis(250));
    assert_eq!(config.stale_lock_threshold(), Duration::from_secs(60));
    assert!(config.strict_mode);
    assert_eq!(config.max_store_bytes, 4096);
    assert!(config.backup);

    let settings = config.lock_settings();
    assert!(settings.strict);
    assert_eq!(settings.timeout, Duration::from_millis(5500));
}

#[test]
fn test_unknown_fields_ignored() {
    let yaml = r#"
store_path: todos.json
future_option: whatever
"#;
    let config = StoreConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.store_path, "todos.json");
}

#[test]
fn test_backend_cannot_be_forced_from_yaml() {
    // Processes on one store must agree on the backend, so it is never configurable.
    let config = StoreConfig::from_yaml("lock_backend: degraded").unwrap();
    assert_eq!(config, StoreConfig::default());
    assert!(!config.to_yaml().unwrap().contains("lock_backend"));
}

#[test]
fn test_validation_rejects_bad_values() {
    for yaml in [
        "lock_timeout: 0",
        "lock_timeout: -1",
        "lock_poll_interval: 0",
        "stale_lock_threshold: .nan",
        "lock_timeout: .inf",
        "max_store_bytes: 0",
        "store_path: ''",
    ] {
        let err = StoreConfig::from_yaml(yaml).unwrap_err();
        assert!(
            matches!(err, FlywheelError::Config(_)),
            "expected config error for {:?}",
            yaml
        );
        assert_eq!(err.exit_code(), crate::exit_codes::USER_ERROR);
    }
}

#[test]
fn test_yaml_roundtrip() {
    let config = StoreConfig {
        backup: true,
        strict_mode: true,
        ..StoreConfig::default()
    };
    let yaml = config.to_yaml().unwrap();
    assert!(yaml.contains("strict_mode: true"));
    assert_eq!(StoreConfig::from_yaml(&yaml).unwrap(), config);
}

#[test]
fn test_env_overrides_from_lookup() {
    let env: HashMap<&str, &str> = [
        (ENV_DB, "/tmp/other.json"),
        (ENV_BACKUP, "TRUE"),
        (ENV_STRICT_LOCKING, "1"),
    ]
    .into_iter()
    .collect();

    let mut config = StoreConfig::default();
    config.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.store_path, "/tmp/other.json");
    assert!(config.backup);
    assert!(config.strict_mode);
}

#[test]
fn test_env_flag_parsing() {
    assert!(parse_env_flag("1"));
    assert!(parse_env_flag("true"));
    assert!(parse_env_flag(" True "));
    assert!(!parse_env_flag("0"));
    assert!(!parse_env_flag("yes"));
    assert!(!parse_env_flag(""));
}

#[test]
fn test_store_path_in_resolves_relative() {
    let config = StoreConfig::default();
    assert_eq!(
        config.store_path_in(Path::new("/work")),
        Path::new("/work/.todo.json")
    );

    let absolute = StoreConfig {
        store_path: "/data/todo.json".to_string(),
        ..StoreConfig::default()
    };
    assert_eq!(
        absolute.store_path_in(Path::new("/work")),
        Path::new("/data/todo.json")
    );
}

fn clear_env() {
    // SAFETY: env-mutating tests are serialized with #[serial].
    unsafe {
        std::env::remove_var(ENV_DB);
        std::env::remove_var(ENV_BACKUP);
        std::env::remove_var(ENV_STRICT_LOCKING);
    }
}

#[test]
#[serial]
fn test_resolve_precedence() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join(".flywheel.yaml"),
        "store_path: from_yaml.json\nbackup: false\n",
    )
    .unwrap();

    // YAML over defaults.
    let config = StoreConfig::resolve(None, temp_dir.path(), None).unwrap();
    assert_eq!(config.store_path, "from_yaml.json");

    // Environment over YAML.
    unsafe {
        std::env::set_var(ENV_DB, "from_env.json");
        std::env::set_var(ENV_BACKUP, "1");
    }
    let config = StoreConfig::resolve(None, temp_dir.path(), None).unwrap();
    assert_eq!(config.store_path, "from_env.json");
    assert!(config.backup);

    // CLI over environment.
    let config =
        StoreConfig::resolve(None, temp_dir.path(), Some(Path::new("from_cli.json"))).unwrap();
    assert_eq!(config.store_path, "from_cli.json");

    clear_env();
}

#[test]
#[serial]
fn test_resolve_explicit_config_must_exist() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.yaml");

    let err = StoreConfig::resolve(Some(&missing), temp_dir.path(), None).unwrap_err();
    assert!(matches!(err, FlywheelError::Config(_)));

    // No file at all means defaults.
    let config = StoreConfig::resolve(None, temp_dir.path(), None).unwrap();
    assert_eq!(config, StoreConfig::default());
}
