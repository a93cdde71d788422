//! Error taxonomy for Secretseal.
//!
//! Every fallible operation in the workspace returns an [`AppError`]: a
//! classified kind, a human-readable message, an optional underlying cause,
//! and a string context map (`path`, `details`, `rollback_error`, ...).

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, AppError>;

/// Categories an error can fall into.
///
/// The kind drives user-facing guidance and whether a failed operation is
/// rolled back or passed through as informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong passphrase, missing decryption key, permission problems.
    Security,
    /// I/O, backup/restore failures, missing files.
    FileOperation,
    /// Key generation or passphrase-wrapping of key material.
    KeyManagement,
    /// Missing or invalid configuration, unmatched tool patterns.
    Config,
    /// Anything not covered above.
    General,
}

impl ErrorKind {
    /// Kind-specific guidance shown alongside the error message.
    pub fn guidance(&self) -> &'static str {
        match self {
            ErrorKind::Security => {
                "This is a security-related error. Verify your passphrase and file permissions."
            }
            ErrorKind::FileOperation => {
                "This error occurred during a file operation. Check file paths and permissions."
            }
            ErrorKind::KeyManagement => {
                "This error occurred during key management. Your keys may be corrupted or inaccessible."
            }
            ErrorKind::Config => {
                "This error points at missing or invalid configuration. Check your config file and tool setup."
            }
            ErrorKind::General => "",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Security => "security",
            ErrorKind::FileOperation => "file operation",
            ErrorKind::KeyManagement => "key management",
            ErrorKind::Config => "config",
            ErrorKind::General => "general",
        };
        f.write_str(name)
    }
}

/// A classified application error.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    context: BTreeMap<String, String>,
}

impl AppError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            context: BTreeMap::new(),
        }
    }

    /// Wrap an underlying error with a kind and message.
    pub fn wrap(
        cause: impl std::error::Error + Send + Sync + 'static,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: Some(Box::new(cause)),
            context: BTreeMap::new(),
        }
    }

    /// Attach a context entry, e.g. `path` or `details`.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Context entries attached to this error.
    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Merge a rollback failure into this error.
    ///
    /// Both the original failure and the rollback failure stay visible: the
    /// rollback failure lands in the context map under `rollback_error`.
    pub fn with_rollback_failure(self, rollback_err: &AppError) -> Self {
        self.with_context("rollback_error", rollback_err.to_string())
    }

    pub fn is_security(&self) -> bool {
        self.kind == ErrorKind::Security
    }

    pub fn is_file_operation(&self) -> bool {
        self.kind == ErrorKind::FileOperation
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::wrap(err, ErrorKind::FileOperation, "I/O error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_cause() {
        let err = AppError::new(ErrorKind::Security, "incorrect passphrase");
        assert_eq!(err.to_string(), "incorrect passphrase");
        assert!(err.is_security());
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = AppError::wrap(io, ErrorKind::FileOperation, "cannot back up file");
        assert!(err.source().is_some());
        assert_eq!(err.kind(), ErrorKind::FileOperation);
    }

    #[test]
    fn test_context_accumulates() {
        let err = AppError::new(ErrorKind::General, "tool failed")
            .with_context("details", "stderr text")
            .with_context("path", "/tmp/x");
        assert_eq!(err.context().get("details").unwrap(), "stderr text");
        assert_eq!(err.context().get("path").unwrap(), "/tmp/x");
    }

    #[test]
    fn test_rollback_failure_is_preserved() {
        let rollback = AppError::new(ErrorKind::FileOperation, "restore failed");
        let err = AppError::new(ErrorKind::General, "encrypt failed")
            .with_rollback_failure(&rollback);
        assert_eq!(
            err.context().get("rollback_error").unwrap(),
            "restore failed"
        );
        // The original message is untouched.
        assert_eq!(err.to_string(), "encrypt failed");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = io.into();
        assert_eq!(err.kind(), ErrorKind::FileOperation);
    }
}
