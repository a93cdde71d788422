//! Default path resolution.
//!
//! These helpers are consulted only when building configuration defaults or
//! at CLI startup. Core components take explicit paths through their
//! constructors and never look up home or config directories themselves.

use std::path::PathBuf;

use crate::error::{AppError, ErrorKind, Result};

/// The Secretseal config directory (`<user-config-dir>/secretseal`).
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| {
        AppError::new(
            ErrorKind::Config,
            "Could not determine user config directory",
        )
    })?;
    Ok(base.join("secretseal"))
}

/// The main config file (`<user-config-dir>/secretseal/config.json`).
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Default backup directory (`<user-config-dir>/secretseal/backups`).
pub fn default_backup_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("backups"))
}

/// Default decrypted key location, shared with the encryption tool's own
/// lookup (`~/.config/sops/age/keys.txt`).
pub fn default_key_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        AppError::new(ErrorKind::Config, "Could not determine home directory")
    })?;
    Ok(home.join(".config").join("sops").join("age").join("keys.txt"))
}

/// Default encrypted key location: the key path with `.encrypted` appended.
pub fn default_encrypted_key_path() -> Result<PathBuf> {
    let mut path = default_key_path()?.into_os_string();
    path.push(".encrypted");
    Ok(PathBuf::from(path))
}
