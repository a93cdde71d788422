//! Config save/load roundtrip integration tests.

use std::time::Duration;

use secretseal_core::Config;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.key_path, config.key_path);
    assert_eq!(loaded.encrypted_key_path, config.encrypted_key_path);
    assert_eq!(loaded.auto_delete_interval, config.auto_delete_interval);
    assert_eq!(loaded.backup.max_backups, config.backup.max_backups);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.auto_delete_interval = Duration::from_secs(90 * 60);
    config.default_recipients = "age1abc, age1def".to_string();
    config.backup.dir = Some(dir.path().join("backups"));
    config.backup.max_backups = 9;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    // Duration survives the string encoding
    assert_eq!(loaded.auto_delete_interval, Duration::from_secs(90 * 60));
    assert_eq!(
        loaded.default_recipient_list(),
        vec!["age1abc".to_string(), "age1def".to_string()]
    );
    assert_eq!(loaded.backup.dir, Some(dir.path().join("backups")));
    assert_eq!(loaded.backup.max_backups, 9);
}

#[test]
fn test_config_rejects_invalid_values() {
    let mut config = Config::default();
    config.backup.max_backups = 0;
    config.auto_delete_interval = Duration::ZERO;

    let err = config.validate().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("auto_delete_interval"));
    assert!(message.contains("max_backups"));
}
