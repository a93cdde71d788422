//! Orchestration of secret-file operations.
//!
//! Every mutating operation follows the same bracket: take the path's
//! single-flight lock, snapshot the files that will change, invoke the
//! encryption tool, then commit on success or classify-and-rollback on
//! failure. A rollback failure never hides the original error; both travel
//! in one compounded [`AppError`].

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use secretseal_core::classify::DiagnosticClassifier;
use secretseal_core::error::{AppError, ErrorKind, Result};
use secretseal_core::fsutil;
use secretseal_recovery::{Transaction, TransactionManager};

use crate::sops::{extract_recipients, parse_encrypted_flag, EncryptionTool, FileStatus, ToolError};

/// Result of a successful operation, for display to the user.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    /// Human-readable summary, e.g. the affected filename.
    pub summary: String,
    /// Captured tool stdout when the operation produces output (decrypt to
    /// stdout); `None` otherwise.
    pub stdout: Option<String>,
}

impl OperationOutcome {
    fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            stdout: None,
        }
    }

    fn with_stdout(mut self, stdout: String) -> Self {
        self.stdout = Some(stdout);
        self
    }
}

/// Front door for encrypt/decrypt/edit/add-recipient/rotate on secret files.
pub struct SecretOperationFacade {
    tool: EncryptionTool,
    transactions: TransactionManager,
    classifier: Arc<dyn DiagnosticClassifier>,
}

impl SecretOperationFacade {
    pub fn new(
        tool: EncryptionTool,
        transactions: TransactionManager,
        classifier: Arc<dyn DiagnosticClassifier>,
    ) -> Self {
        Self {
            tool,
            transactions,
            classifier,
        }
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Encrypt `path` for `recipients`, in place or to the outcome's stdout.
    ///
    /// Only the in-place form mutates the source, so only it runs inside a
    /// transaction.
    pub async fn encrypt(
        &self,
        path: &Path,
        recipients: &[String],
        in_place: bool,
    ) -> Result<OperationOutcome> {
        let _guard = self.transactions.lock_path(path).await;
        let outcome = OperationOutcome::new(format!("Encrypted {}", display_name(path)));

        if in_place {
            let tx = self.transactions.begin(&[path]).await?;
            let result = self.tool.encrypt(path, recipients, true).await;
            self.conclude(tx, result).await?;
            info!(path = %path.display(), "encrypted file");
            return Ok(outcome);
        }

        let stdout = self
            .tool
            .encrypt(path, recipients, false)
            .await
            .map_err(|e| self.classify_tool_error(e))?;
        Ok(outcome.with_stdout(stdout))
    }

    /// Decrypt `path` in place, to `output`, or to the outcome's stdout.
    ///
    /// Only the in-place form mutates the source, so only it runs inside a
    /// transaction.
    pub async fn decrypt(
        &self,
        path: &Path,
        in_place: bool,
        output: Option<&Path>,
    ) -> Result<OperationOutcome> {
        let _guard = self.transactions.lock_path(path).await;

        if in_place {
            let tx = self.transactions.begin(&[path]).await?;
            let result = self.tool.decrypt(path, true, None).await;
            self.conclude(tx, result).await?;
            info!(path = %path.display(), "decrypted file in place");
            return Ok(OperationOutcome::new(format!(
                "Decrypted {}",
                display_name(path)
            )));
        }

        let stdout = self
            .tool
            .decrypt(path, false, output)
            .await
            .map_err(|e| self.classify_tool_error(e))?;

        match output {
            Some(output) => {
                info!(path = %path.display(), output = %output.display(), "decrypted file to output");
                Ok(OperationOutcome::new(format!(
                    "Decrypted {} to {}",
                    display_name(path),
                    output.display()
                )))
            }
            None => Ok(OperationOutcome::new(format!(
                "Decrypted {}",
                display_name(path)
            ))
            .with_stdout(stdout)),
        }
    }

    /// Open `path` in the editor through the tool.
    pub async fn edit(&self, path: &Path) -> Result<OperationOutcome> {
        let _guard = self.transactions.lock_path(path).await;
        let tx = self.transactions.begin(&[path]).await?;

        let result = self.tool.edit(path).await.map(|()| String::new());
        self.conclude(tx, result).await?;

        info!(path = %path.display(), "edited file");
        Ok(OperationOutcome::new(format!(
            "Edited {}",
            display_name(path)
        )))
    }

    /// Grant `recipient` access to `path`.
    pub async fn add_recipient(&self, path: &Path, recipient: &str) -> Result<OperationOutcome> {
        let _guard = self.transactions.lock_path(path).await;
        let tx = self.transactions.begin(&[path]).await?;

        let result = self.tool.add_recipient(path, recipient).await;
        self.conclude(tx, result).await?;

        info!(path = %path.display(), recipient, "added recipient");
        Ok(OperationOutcome::new(format!(
            "Added recipient to {}",
            display_name(path)
        )))
    }

    /// Rotate the data key of `path`.
    pub async fn rotate(&self, path: &Path) -> Result<OperationOutcome> {
        let _guard = self.transactions.lock_path(path).await;
        let tx = self.transactions.begin(&[path]).await?;

        let result = self.tool.rotate(path).await;
        self.conclude(tx, result).await?;

        info!(path = %path.display(), "rotated data key");
        Ok(OperationOutcome::new(format!(
            "Rotated key for {}",
            display_name(path)
        )))
    }

    /// Query encryption status and recipients. Read-only, no transaction.
    pub async fn file_status(&self, path: &Path) -> Result<FileStatus> {
        if !fsutil::file_exists(path) {
            return Err(
                AppError::new(ErrorKind::FileOperation, "File does not exist")
                    .with_context("path", path.display().to_string()),
            );
        }

        match self.tool.file_status_raw(path).await {
            Ok(output) => {
                let encrypted = parse_encrypted_flag(&output)
                    .unwrap_or_else(|| output.contains(r#""encrypted": true"#));
                let recipients = if encrypted {
                    extract_recipients(&output)
                } else {
                    Vec::new()
                };
                Ok(FileStatus {
                    encrypted,
                    recipients,
                })
            }
            // The tool reports plaintext files as an error; that is a valid
            // status, not a failure.
            Err(ToolError::Failed { stderr }) if stderr.contains("not an encrypted file") => {
                Ok(FileStatus {
                    encrypted: false,
                    recipients: Vec::new(),
                })
            }
            Err(e) => Err(self.classify_tool_error(e)),
        }
    }

    /// Commit on success; classify, roll back, and compound on failure.
    async fn conclude(
        &self,
        mut tx: Transaction,
        result: std::result::Result<String, ToolError>,
    ) -> Result<String> {
        match result {
            Ok(stdout) => {
                tx.commit();
                Ok(stdout)
            }
            Err(tool_err) => {
                let classified = self.classify_tool_error(tool_err);
                match tx.rollback().await {
                    Ok(()) => Err(classified),
                    Err(rollback_err) => {
                        warn!("rollback failed after tool error: {rollback_err}");
                        Err(classified.with_rollback_failure(&rollback_err))
                    }
                }
            }
        }
    }

    fn classify_tool_error(&self, err: ToolError) -> AppError {
        match err {
            ToolError::Spawn(io) => {
                AppError::wrap(io, ErrorKind::FileOperation, "Failed to run encryption tool")
            }
            ToolError::Failed { stderr } => self.classifier.classify(&stderr),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
