//! Raw invocations of the external encryption tool.
//!
//! Thin, classification-free wrappers: every method reports either a spawn
//! failure or the tool's exit status plus captured stderr, and the facade
//! decides what that means. Transaction bracketing also lives in the facade.

use std::path::Path;
use std::process::Stdio;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

/// Status of a secret file as reported by the tool's `filestatus` query.
#[derive(Debug, Clone)]
pub struct FileStatus {
    pub encrypted: bool,
    pub recipients: Vec<String>,
}

/// A failed tool invocation, before classification.
#[derive(Debug)]
pub enum ToolError {
    /// The process could not be started at all.
    Spawn(std::io::Error),
    /// The process ran and exited non-zero.
    Failed { stderr: String },
}

type ToolResult<T> = std::result::Result<T, ToolError>;

/// Handle to the external encryption tool binary.
#[derive(Debug, Clone)]
pub struct EncryptionTool {
    program: String,
    editor_command: Option<String>,
}

impl Default for EncryptionTool {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionTool {
    pub fn new() -> Self {
        Self {
            program: "sops".to_string(),
            editor_command: None,
        }
    }

    /// Substitute the binary, e.g. a test double.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            editor_command: None,
        }
    }

    /// Editor the tool should launch for in-place edits. `"default"` defers
    /// to the tool's own EDITOR lookup.
    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        let editor = editor.into();
        if !editor.is_empty() && editor != "default" {
            self.editor_command = Some(editor);
        }
        self
    }

    /// Encrypt `path` for `recipients`, comma-joined into a single flag.
    pub async fn encrypt(
        &self,
        path: &Path,
        recipients: &[String],
        in_place: bool,
    ) -> ToolResult<String> {
        let mut args: Vec<String> = Vec::new();
        if !recipients.is_empty() {
            args.push(format!("--age={}", recipients.join(",")));
        }
        args.push("-e".to_string());
        if in_place {
            args.push("-i".to_string());
        }
        self.run_capture(&args, path).await
    }

    /// Decrypt `path` in place, to `output`, or to the returned stdout.
    pub async fn decrypt(
        &self,
        path: &Path,
        in_place: bool,
        output: Option<&Path>,
    ) -> ToolResult<String> {
        let mut args = vec!["-d".to_string()];
        if in_place {
            args.push("-i".to_string());
        } else if let Some(output) = output {
            args.push("--output".to_string());
            args.push(output.display().to_string());
        }
        self.run_capture(&args, path).await
    }

    /// Open `path` in the configured editor via the tool, terminal attached.
    pub async fn edit(&self, path: &Path) -> ToolResult<()> {
        debug!(path = %path.display(), "launching editor");
        let mut cmd = Command::new(&self.program);
        cmd.arg(path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(editor) = &self.editor_command {
            cmd.env("SOPS_EDITOR", editor);
        }

        let status = cmd.status().await.map_err(ToolError::Spawn)?;
        if status.success() {
            Ok(())
        } else {
            // Stderr went to the terminal; report the exit only.
            Err(ToolError::Failed {
                stderr: format!("editor session exited with {status}"),
            })
        }
    }

    /// Rotate the data key of `path` in place.
    pub async fn rotate(&self, path: &Path) -> ToolResult<String> {
        self.run_capture(&["rotate".to_string(), "-i".to_string()], path)
            .await
    }

    /// Grant `recipient` access to `path`.
    pub async fn add_recipient(&self, path: &Path, recipient: &str) -> ToolResult<String> {
        self.run_capture(
            &[
                "updatekeys".to_string(),
                "--age".to_string(),
                recipient.to_string(),
            ],
            path,
        )
        .await
    }

    /// Raw machine-readable `filestatus` output for `path`.
    pub async fn file_status_raw(&self, path: &Path) -> ToolResult<String> {
        self.run_capture(
            &[
                "--output-type".to_string(),
                "json".to_string(),
                "filestatus".to_string(),
            ],
            path,
        )
        .await
    }

    async fn run_capture(&self, args: &[String], path: &Path) -> ToolResult<String> {
        debug!(program = %self.program, ?args, path = %path.display(), "invoking encryption tool");
        let output = Command::new(&self.program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(ToolError::Spawn)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ToolError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

static RECIPIENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"recipient":\s*"([^"]+)""#).unwrap());

/// Pull recipient identifiers out of `filestatus` output.
pub fn extract_recipients(output: &str) -> Vec<String> {
    RECIPIENT_PATTERN
        .captures_iter(output)
        .map(|c| c[1].to_string())
        .collect()
}

/// Read the `encrypted` boolean out of `filestatus` output, tolerating
/// extra fields and duplicate keys.
pub fn parse_encrypted_flag(output: &str) -> Option<bool> {
    serde_json::from_str::<serde_json::Value>(output)
        .ok()
        .and_then(|v| v.get("encrypted").and_then(|b| b.as_bool()))
}
