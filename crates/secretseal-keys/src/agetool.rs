//! Invocation of the external key tool.
//!
//! The tool generates an asymmetric key pair and passphrase-wraps or unwraps
//! its private half. Passphrases travel over the child's stdin only, and key
//! material is handed over through an ephemeral 0600 temp file. Neither ever
//! appears in an argument list.

use std::io::Write as _;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use secretseal_core::classify::{DiagnosticClassifier, PatternClassifier};
use secretseal_core::error::{AppError, ErrorKind, Result};
use secretseal_core::secret::SecretString;

/// Line prefix announcing the public key in generator output.
const PUBLIC_KEY_PREFIX: &str = "# public key: ";
/// Token prefix of the private key line in generator output.
const PRIVATE_KEY_PREFIX: &str = "AGE-SECRET-KEY-";

/// An asymmetric key pair produced by the key tool.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Private key material. Redacted in Debug output, zeroed on drop.
    pub private_key: SecretString,
    /// Public identifier others encrypt to.
    pub public_key: String,
    /// Whether `private_key` currently holds passphrase-wrapped ciphertext.
    pub is_encrypted: bool,
}

/// Handle to the external key tool binaries.
#[derive(Debug, Clone)]
pub struct KeyTool {
    keygen_program: String,
    encrypt_program: String,
}

impl Default for KeyTool {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyTool {
    pub fn new() -> Self {
        Self {
            keygen_program: "age-keygen".to_string(),
            encrypt_program: "age".to_string(),
        }
    }

    /// Substitute the binaries, e.g. test doubles.
    pub fn with_programs(keygen: impl Into<String>, encrypt: impl Into<String>) -> Self {
        Self {
            keygen_program: keygen.into(),
            encrypt_program: encrypt.into(),
        }
    }

    /// Generate a fresh key pair.
    pub async fn generate(&self) -> Result<KeyPair> {
        let output = Command::new(&self.keygen_program)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                AppError::wrap(e, ErrorKind::KeyManagement, "Failed to run key generator")
                    .with_context("program", self.keygen_program.clone())
            })?;

        if !output.status.success() {
            return Err(AppError::new(
                ErrorKind::KeyManagement,
                "Key generator exited with an error",
            )
            .with_context("details", String::from_utf8_lossy(&output.stderr).trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut public_key = None;
        let mut private_key = None;
        for line in stdout.lines() {
            if let Some(rest) = line.strip_prefix(PUBLIC_KEY_PREFIX) {
                public_key = Some(rest.trim().to_string());
            } else if line.starts_with(PRIVATE_KEY_PREFIX) {
                private_key = Some(line.trim().to_string());
            }
        }

        match (public_key, private_key) {
            (Some(public_key), Some(private_key)) => {
                debug!(public_key, "generated key pair");
                Ok(KeyPair {
                    private_key: SecretString::new(private_key),
                    public_key,
                    is_encrypted: false,
                })
            }
            _ => Err(AppError::new(
                ErrorKind::KeyManagement,
                "Failed to parse key generator output",
            )),
        }
    }

    /// Passphrase-wrap the private key. Returns the ciphertext.
    ///
    /// The passphrase is written to stdin twice because the tool asks for a
    /// confirming entry.
    pub async fn encrypt_key(&self, pair: &KeyPair, passphrase: &SecretString) -> Result<Vec<u8>> {
        let key_file = write_key_material(pair.private_key.expose().as_bytes())?;

        let mut child = Command::new(&self.encrypt_program)
            .args(["-p", "-o", "-"])
            .arg(key_file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AppError::wrap(e, ErrorKind::KeyManagement, "Failed to start key tool")
                    .with_context("program", self.encrypt_program.clone())
            })?;

        let confirmation = format!("{0}\n{0}\n", passphrase.expose());
        feed_stdin(&mut child, confirmation.as_bytes()).await?;

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(AppError::new(
                ErrorKind::KeyManagement,
                "Failed to passphrase-protect key",
            )
            .with_context("details", String::from_utf8_lossy(&output.stderr).trim()));
        }

        Ok(output.stdout)
    }

    /// Unwrap passphrase-protected key material back to plaintext.
    ///
    /// Wrong-passphrase diagnostics classify as `Security`; spawn and pipe
    /// failures surface as `FileOperation`.
    pub async fn decrypt_key(
        &self,
        ciphertext: &[u8],
        passphrase: &SecretString,
    ) -> Result<SecretString> {
        let cipher_file = write_key_material(ciphertext)?;

        let mut child = Command::new(&self.encrypt_program)
            .arg("-d")
            .arg(cipher_file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(AppError::from)?;

        let entry = format!("{}\n", passphrase.expose());
        feed_stdin(&mut child, entry.as_bytes()).await?;

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let classified = PatternClassifier::new().classify(&stderr);
            if classified.is_security() {
                return Err(classified);
            }
            return Err(AppError::new(ErrorKind::Security, "Failed to decrypt key")
                .with_context("details", stderr.trim()));
        }

        let plaintext = String::from_utf8(output.stdout).map_err(|e| {
            AppError::wrap(e, ErrorKind::KeyManagement, "Decrypted key is not valid UTF-8")
        })?;
        Ok(SecretString::new(plaintext))
    }
}

/// Write key material to an ephemeral temp file (0600 on Unix). The file is
/// unlinked when the handle drops.
fn write_key_material(data: &[u8]) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new().map_err(|e| {
        AppError::wrap(e, ErrorKind::FileOperation, "Failed to create temporary key file")
    })?;
    file.write_all(data).map_err(|e| {
        AppError::wrap(e, ErrorKind::FileOperation, "Failed to write temporary key file")
    })?;
    file.flush()?;
    Ok(file)
}

async fn feed_stdin(child: &mut tokio::process::Child, data: &[u8]) -> Result<()> {
    let mut stdin = child.stdin.take().ok_or_else(|| {
        AppError::new(ErrorKind::KeyManagement, "Key tool stdin is unavailable")
    })?;
    stdin.write_all(data).await?;
    stdin.shutdown().await?;
    drop(stdin);
    Ok(())
}
