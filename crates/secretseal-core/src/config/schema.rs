//! Configuration schema definitions.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};
use crate::paths;

/// Main Secretseal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the decrypted key lives while unlocked.
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,

    /// Where the passphrase-wrapped key is persisted.
    #[serde(default = "default_encrypted_key_path")]
    pub encrypted_key_path: PathBuf,

    /// How long a decrypted key may stay on disk, as a duration string
    /// (`"30m"`, `"1h30m"`, `"90s"`).
    #[serde(default = "default_auto_delete_interval", with = "duration_str")]
    pub auto_delete_interval: Duration,

    /// Editor invoked for in-place edits. `"default"` defers to the
    /// encryption tool's own EDITOR lookup.
    #[serde(default = "default_editor_command")]
    pub editor_command: String,

    /// Comma-separated recipients applied when an encrypt operation names
    /// none explicitly.
    #[serde(default)]
    pub default_recipients: String,

    /// Backup store settings.
    #[serde(default)]
    pub backup: BackupConfig,
}

/// Backup store configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Backup directory. `None` resolves to the default under the config dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Retained backups per original filename; oldest evicted beyond this.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_backups: default_max_backups(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_path: default_key_path(),
            encrypted_key_path: default_encrypted_key_path(),
            auto_delete_interval: default_auto_delete_interval(),
            editor_command: default_editor_command(),
            default_recipients: String::new(),
            backup: BackupConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();

        if self.key_path.as_os_str().is_empty() {
            errors.push("key_path must not be empty".to_string());
        }
        if self.encrypted_key_path.as_os_str().is_empty() {
            errors.push("encrypted_key_path must not be empty".to_string());
        }
        if self.auto_delete_interval.is_zero() {
            errors.push("auto_delete_interval must be greater than zero".to_string());
        }
        if self.backup.max_backups == 0 {
            errors.push("backup.max_backups must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::new(ErrorKind::Config, errors.join("; ")))
        }
    }

    /// Default recipients as a list, empty entries dropped.
    pub fn default_recipient_list(&self) -> Vec<String> {
        self.default_recipients
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn default_key_path() -> PathBuf {
    paths::default_key_path().unwrap_or_else(|_| PathBuf::from("keys.txt"))
}

fn default_encrypted_key_path() -> PathBuf {
    paths::default_encrypted_key_path().unwrap_or_else(|_| PathBuf::from("keys.txt.encrypted"))
}

fn default_auto_delete_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_editor_command() -> String {
    "default".to_string()
}

fn default_max_backups() -> usize {
    5
}

/// Serde support for duration strings like `"30m"`, `"1h30m"`, `"90s"`.
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Render a duration compactly: whole hours as `h`, whole minutes as
    /// `m`, everything else in seconds.
    pub fn format(d: &Duration) -> String {
        let secs = d.as_secs();
        if secs > 0 && secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs > 0 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }

    /// Parse a concatenation of `<number><unit>` terms with units
    /// `s`, `m`, `h`, `d`. A bare number means seconds.
    pub fn parse(input: &str) -> Result<Duration, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err("empty duration".to_string());
        }
        if let Ok(secs) = input.parse::<u64>() {
            return Ok(Duration::from_secs(secs));
        }

        let mut total = 0u64;
        let mut number = String::new();
        for ch in input.chars() {
            if ch.is_ascii_digit() {
                number.push(ch);
                continue;
            }
            let value: u64 = number
                .parse()
                .map_err(|_| format!("invalid duration '{input}'"))?;
            number.clear();
            let unit_secs = match ch {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                _ => return Err(format!("unknown duration unit '{ch}' in '{input}'")),
            };
            total = value
                .checked_mul(unit_secs)
                .and_then(|term| total.checked_add(term))
                .ok_or_else(|| format!("duration '{input}' is out of range"))?;
        }
        if !number.is_empty() {
            return Err(format!("trailing number without unit in '{input}'"));
        }
        Ok(Duration::from_secs(total))
    }
}
