//! Timestamped, retention-bounded backups of single files.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use secretseal_core::error::{AppError, ErrorKind, Result};
use secretseal_core::fsutil;

/// Backups retained per original filename unless configured otherwise.
pub const DEFAULT_MAX_BACKUPS: usize = 5;

/// Stores pre-mutation copies of files as
/// `<backup-dir>/<basename>-<YYYYMMDD-HHMMSS>.bak`.
///
/// The timestamp naming is monotonic, so lexicographic order over backup
/// names is creation order.
#[derive(Debug, Clone)]
pub struct BackupStore {
    backup_dir: PathBuf,
    max_backups: usize,
}

impl BackupStore {
    /// Create a store rooted at `backup_dir`. The directory is created on
    /// first use, not here.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }

    /// Override the per-basename retention bound.
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Back up `path` before a mutation. Returns the backup's location.
    ///
    /// The source must exist. Retention enforcement afterwards is
    /// best-effort: eviction failures are logged, never fatal.
    pub async fn backup_file(&self, path: &Path) -> Result<PathBuf> {
        fsutil::ensure_dir(&self.backup_dir).await?;

        if !fsutil::file_exists(path) {
            return Err(AppError::new(
                ErrorKind::FileOperation,
                "Cannot back up non-existent file",
            )
            .with_context("path", path.display().to_string()));
        }

        let basename = file_basename(path)?;
        let timestamp = Local::now().format("%Y%m%d-%H%M%S");
        let backup_path = self.backup_dir.join(format!("{basename}-{timestamp}.bak"));

        fsutil::copy_private(path, &backup_path)
            .await
            .map_err(|e| {
                e.with_context("source", path.display().to_string())
                    .with_context("destination", backup_path.display().to_string())
            })?;
        debug!(source = %path.display(), backup = %backup_path.display(), "backed up file");

        if let Err(e) = self.enforce_retention(&basename).await {
            warn!(basename, "backup retention cleanup failed: {e}");
        }

        Ok(backup_path)
    }

    /// Restore `path` from its most recent backup and return the backup
    /// that was used. Fails when no backup exists for the basename.
    pub async fn restore_from_backup(&self, path: &Path) -> Result<PathBuf> {
        let basename = file_basename(path)?;
        let backups = self.list_backups(&basename).await?;

        let most_recent = backups.last().ok_or_else(|| {
            AppError::new(ErrorKind::FileOperation, "No backups found for file")
                .with_context("file", basename.clone())
        })?;

        fsutil::copy_private(most_recent, path).await.map_err(|e| {
            e.with_context("backup", most_recent.display().to_string())
                .with_context("destination", path.display().to_string())
        })?;
        debug!(backup = %most_recent.display(), target = %path.display(), "restored from backup");

        Ok(most_recent.clone())
    }

    /// All backups for `basename`, oldest first.
    pub async fn list_backups(&self, basename: &str) -> Result<Vec<PathBuf>> {
        if !fsutil::dir_exists(&self.backup_dir) {
            return Ok(Vec::new());
        }

        let prefix = format!("{basename}-");
        let mut backups = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.backup_dir).await.map_err(|e| {
            AppError::wrap(e, ErrorKind::FileOperation, "Failed to read backup directory")
                .with_context("directory", self.backup_dir.display().to_string())
        })?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name
                .strip_prefix(&prefix)
                .is_some_and(is_timestamp_suffix)
                && entry.file_type().await.map(|t| t.is_file()).unwrap_or(false)
            {
                backups.push(entry.path());
            }
        }

        backups.sort();
        Ok(backups)
    }

    /// Evict the oldest backups for `basename` beyond the retention bound.
    async fn enforce_retention(&self, basename: &str) -> Result<()> {
        let backups = self.list_backups(basename).await?;
        if backups.len() <= self.max_backups {
            return Ok(());
        }

        for stale in &backups[..backups.len() - self.max_backups] {
            if let Err(e) = tokio::fs::remove_file(stale).await {
                warn!(backup = %stale.display(), "failed to delete old backup: {e}");
            } else {
                debug!(backup = %stale.display(), "evicted old backup");
            }
        }
        Ok(())
    }
}

/// Accept exactly `YYYYMMDD-HHMMSS.bak` after the basename prefix.
///
/// A looser suffix check would also capture backups of any file whose name
/// merely extends the basename (`a.yaml-prod` backups listed, evicted, and
/// restorable as backups of `a.yaml`).
fn is_timestamp_suffix(rest: &str) -> bool {
    let Some(stamp) = rest.strip_suffix(".bak") else {
        return false;
    };
    let bytes = stamp.as_bytes();
    bytes.len() == 15
        && bytes[8] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 8 || b.is_ascii_digit())
}

fn file_basename(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::new(ErrorKind::FileOperation, "Path has no usable file name")
                .with_context("path", path.display().to_string())
        })
}
