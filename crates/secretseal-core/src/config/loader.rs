//! Configuration loading and persistence.

use std::fs;
use std::path::Path;

use super::Config;
use crate::error::{AppError, ErrorKind, Result};
use crate::paths;

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file is not an error: defaults apply until the user saves.
    pub fn load_default() -> Result<Self> {
        let path = paths::config_file()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AppError::new(
                ErrorKind::Config,
                format!("Configuration file not found: {}", path.display()),
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            AppError::wrap(e, ErrorKind::Config, "Failed to read configuration file")
                .with_context("path", path.display().to_string())
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a string. JSON5-tolerant, so hand-edited
    /// files with comments or trailing commas still load.
    pub fn parse(content: &str) -> Result<Self> {
        json5::from_str(content).map_err(|e| {
            AppError::new(
                ErrorKind::Config,
                format!("Failed to parse configuration: {e}"),
            )
        })
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<()> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path, atomically via temp-file rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::wrap(e, ErrorKind::Config, "Failed to serialize configuration")
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::wrap(e, ErrorKind::FileOperation, "Failed to create config directory")
                    .with_context("path", parent.display().to_string())
            })?;
        }

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.default_recipients = "age1abc".to_string();
        config.auto_delete_interval = Duration::from_secs(600);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.default_recipients, "age1abc");
        assert_eq!(loaded.auto_delete_interval, Duration::from_secs(600));
        assert_eq!(loaded.backup.max_backups, config.backup.max_backups);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(&dir.path().join("absent.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_tolerates_json5() {
        let config = Config::parse(
            r#"{
                // hand-edited
                default_recipients: "age1xyz",
                auto_delete_interval: "5m",
            }"#,
        )
        .unwrap();
        assert_eq!(config.default_recipients, "age1xyz");
        assert_eq!(config.auto_delete_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_parse_garbage_is_config_error() {
        let err = Config::parse("not a config").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
