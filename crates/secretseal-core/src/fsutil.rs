//! Filesystem helpers with secret-safe permission handling.
//!
//! Everything written here lands at mode 0600 (files) or 0700 (directories)
//! on Unix. Secret files must never be group- or world-readable.

use std::path::Path;

use tracing::debug;

use crate::error::{AppError, ErrorKind, Result};

/// Overwrite chunk size used by the zero-fill fallback in [`secure_delete`].
const OVERWRITE_CHUNK: usize = 8192;

/// Whether `path` exists and is a regular file.
pub fn file_exists(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

/// Whether `path` exists and is a directory.
pub fn dir_exists(path: &Path) -> bool {
    path.metadata().map(|m| m.is_dir()).unwrap_or(false)
}

/// Create `dir` (and parents) with mode 0700.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        AppError::wrap(e, ErrorKind::FileOperation, "Failed to create directory")
            .with_context("path", dir.display().to_string())
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        tokio::fs::set_permissions(dir, perms).await?;
    }

    Ok(())
}

/// Write `data` to `path` with mode 0600, creating parent directories.
pub async fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    tokio::fs::write(path, data).await.map_err(|e| {
        AppError::wrap(e, ErrorKind::FileOperation, "Failed to write file")
            .with_context("path", path.display().to_string())
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

/// Copy `src` over `dst` by full-content read-then-write, never rename.
///
/// The destination ends up with mode 0600 regardless of the source's bits.
pub async fn copy_private(src: &Path, dst: &Path) -> Result<()> {
    let data = tokio::fs::read(src).await.map_err(|e| {
        AppError::wrap(e, ErrorKind::FileOperation, "Failed to read source file")
            .with_context("path", src.display().to_string())
    })?;
    write_private(dst, &data).await
}

/// Securely erase a file: overwrite its full length with zero bytes in
/// fixed-size chunks, then unlink. Prefers the platform `shred` utility when
/// it is available.
///
/// A missing path is a `FileOperation` error rather than a silent success.
pub async fn secure_delete(path: &Path) -> Result<()> {
    if !file_exists(path) {
        return Err(AppError::new(
            ErrorKind::FileOperation,
            "Cannot securely delete non-existent file",
        )
        .with_context("path", path.display().to_string()));
    }

    if shred_available().await {
        let status = tokio::process::Command::new("shred")
            .arg("-u")
            .arg(path)
            .status()
            .await;
        match status {
            Ok(status) if status.success() => {
                debug!(path = %path.display(), "shredded file");
                return Ok(());
            }
            // shred misbehaved; fall through to the zero-fill path.
            Ok(_) | Err(_) => {}
        }
    }

    overwrite_with_zeros(path).await?;
    tokio::fs::remove_file(path).await.map_err(|e| {
        AppError::wrap(e, ErrorKind::FileOperation, "Failed to remove file after overwrite")
            .with_context("path", path.display().to_string())
    })?;
    debug!(path = %path.display(), "securely deleted file");
    Ok(())
}

async fn shred_available() -> bool {
    tokio::process::Command::new("shred")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

async fn overwrite_with_zeros(path: &Path) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let len = tokio::fs::metadata(path).await?.len();
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|e| {
            AppError::wrap(e, ErrorKind::FileOperation, "Failed to open file for overwriting")
                .with_context("path", path.display().to_string())
        })?;

    let zeros = [0u8; OVERWRITE_CHUNK];
    let mut written = 0u64;
    while written < len {
        let remaining = (len - written).min(OVERWRITE_CHUNK as u64) as usize;
        file.write_all(&zeros[..remaining]).await?;
        written += remaining as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}
