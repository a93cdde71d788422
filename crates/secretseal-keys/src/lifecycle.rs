//! The key lifecycle state machine.
//!
//! Owns the decrypted-key state explicitly: generation, passphrase
//! protection, timed decryption, auto-expiry, and secure erasure. The
//! filesystem is consulted only once, at startup, to resync after a crash or
//! restart; afterwards this manager is the source of truth.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use secretseal_core::error::{AppError, ErrorKind, Result};
use secretseal_core::fsutil;
use secretseal_core::secret::SecretString;

use crate::agetool::{KeyPair, KeyTool};
use crate::passphrase::PassphraseFlow;

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Idle,
    /// A passphrase entry (possibly with confirmation) is in progress.
    AwaitingPassphrase,
    Generating,
    Decrypting,
    Deleting,
}

#[derive(Debug)]
struct KeyState {
    phase: KeyPhase,
    decrypted_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    public_key: Option<String>,
    expiry_task: Option<JoinHandle<()>>,
}

impl KeyState {
    fn clear_decrypted(&mut self) {
        self.decrypted_at = None;
        self.expires_at = None;
        self.public_key = None;
    }
}

/// Manages generation, passphrase protection, timed decryption, auto-expiry,
/// and secure erasure of the key material.
#[derive(Clone)]
pub struct KeyLifecycleManager {
    tool: Arc<KeyTool>,
    key_path: PathBuf,
    encrypted_key_path: PathBuf,
    auto_delete_interval: Duration,
    state: Arc<Mutex<KeyState>>,
}

impl KeyLifecycleManager {
    pub fn new(
        tool: KeyTool,
        key_path: impl Into<PathBuf>,
        encrypted_key_path: impl Into<PathBuf>,
        auto_delete_interval: Duration,
    ) -> Self {
        Self {
            tool: Arc::new(tool),
            key_path: key_path.into(),
            encrypted_key_path: encrypted_key_path.into(),
            auto_delete_interval,
            state: Arc::new(Mutex::new(KeyState {
                phase: KeyPhase::Idle,
                decrypted_at: None,
                expires_at: None,
                public_key: None,
                expiry_task: None,
            })),
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn encrypted_key_path(&self) -> &Path {
        &self.encrypted_key_path
    }

    pub fn phase(&self) -> KeyPhase {
        self.state.lock().expect("key state lock").phase
    }

    /// Whether a decrypted key is currently live.
    pub fn is_decrypted(&self) -> bool {
        self.state
            .lock()
            .expect("key state lock")
            .decrypted_at
            .is_some()
    }

    pub fn public_key(&self) -> Option<String> {
        self.state.lock().expect("key state lock").public_key.clone()
    }

    /// Time left until auto-expiry erases the decrypted key.
    pub fn remaining_lifetime(&self) -> Option<Duration> {
        let state = self.state.lock().expect("key state lock");
        let expires_at = state.expires_at?;
        let remaining = expires_at - Utc::now();
        Some(remaining.to_std().unwrap_or(Duration::ZERO))
    }

    /// Whether an encrypted key exists to unlock.
    pub fn has_encrypted_key(&self) -> bool {
        fsutil::file_exists(&self.encrypted_key_path)
    }

    /// Startup-only recovery path: adopt a decrypted key left on disk by an
    /// earlier process. The adopted key gets a fresh expiry window so it
    /// cannot outlive this process unnoticed.
    pub fn resync(&self) {
        if fsutil::file_exists(&self.key_path) {
            info!(path = %self.key_path.display(), "adopting decrypted key found on disk");
            self.mark_decrypted(None);
        } else {
            self.state.lock().expect("key state lock").clear_decrypted();
        }
    }

    /// Enter passphrase entry for generating a new key. Confirmation is
    /// required because the passphrase is being set for the first time.
    pub fn begin_generation(&self) -> Result<PassphraseFlow> {
        self.enter_awaiting()?;
        Ok(PassphraseFlow::new(true))
    }

    /// Enter passphrase entry for unlocking the existing encrypted key.
    pub fn begin_unlock(&self) -> Result<PassphraseFlow> {
        if !self.has_encrypted_key() {
            return Err(
                AppError::new(ErrorKind::FileOperation, "No encrypted key found")
                    .with_context("path", self.encrypted_key_path.display().to_string()),
            );
        }
        self.enter_awaiting()?;
        Ok(PassphraseFlow::new(false))
    }

    /// Abandon a pending passphrase entry.
    pub fn cancel_passphrase(&self) {
        let mut state = self.state.lock().expect("key state lock");
        if state.phase == KeyPhase::AwaitingPassphrase {
            state.phase = KeyPhase::Idle;
        }
    }

    /// Generate a key pair, passphrase-protect it, and persist both halves.
    ///
    /// Leaves a decrypted key on disk, so the expiry timer is armed exactly
    /// as it is after an unlock.
    pub async fn generate(&self, passphrase: &SecretString) -> Result<KeyPair> {
        self.enter_work(KeyPhase::Generating)?;
        let result = self.generate_inner(passphrase).await;
        self.finish_work(&result);
        result
    }

    async fn generate_inner(&self, passphrase: &SecretString) -> Result<KeyPair> {
        let pair = self.tool.generate().await?;
        let ciphertext = self.tool.encrypt_key(&pair, passphrase).await?;

        fsutil::write_private(&self.encrypted_key_path, &ciphertext)
            .await
            .map_err(|e| e.with_context("path", self.encrypted_key_path.display().to_string()))?;
        fsutil::write_private(&self.key_path, pair.private_key.expose().as_bytes())
            .await
            .map_err(|e| e.with_context("path", self.key_path.display().to_string()))?;

        info!(public_key = pair.public_key, "generated and protected new key");
        self.mark_decrypted(Some(pair.public_key.clone()));
        Ok(pair)
    }

    /// Decrypt the stored key with `passphrase`, recreating the plaintext
    /// key file and (re)arming the expiry timer.
    pub async fn unlock(&self, passphrase: &SecretString) -> Result<()> {
        self.enter_work(KeyPhase::Decrypting)?;
        let result = self.unlock_inner(passphrase).await;
        self.finish_work(&result);
        result
    }

    async fn unlock_inner(&self, passphrase: &SecretString) -> Result<()> {
        let ciphertext = tokio::fs::read(&self.encrypted_key_path).await.map_err(|e| {
            AppError::wrap(e, ErrorKind::FileOperation, "Failed to load encrypted key")
                .with_context("path", self.encrypted_key_path.display().to_string())
        })?;

        let plaintext = self.tool.decrypt_key(&ciphertext, passphrase).await?;
        fsutil::write_private(&self.key_path, plaintext.expose().as_bytes())
            .await
            .map_err(|e| e.with_context("path", self.key_path.display().to_string()))?;

        info!(path = %self.key_path.display(), "decrypted key");
        self.mark_decrypted(public_key_from_material(plaintext.expose()));
        Ok(())
    }

    /// Securely erase the decrypted key now, cancelling any pending expiry.
    pub async fn lock(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("key state lock");
            if state.phase != KeyPhase::Idle {
                return Err(operation_in_progress(state.phase));
            }
            state.phase = KeyPhase::Deleting;
            if let Some(task) = state.expiry_task.take() {
                task.abort();
            }
        }

        let result = fsutil::secure_delete(&self.key_path).await;

        let mut state = self.state.lock().expect("key state lock");
        state.phase = KeyPhase::Idle;
        if result.is_ok() {
            state.clear_decrypted();
            info!(path = %self.key_path.display(), "securely deleted decrypted key");
        } else if !fsutil::file_exists(&self.key_path) {
            // Erasure failed because the file is already gone (removed
            // externally). The timer was aborted above, so resync the state
            // rather than keep claiming a live decrypted key.
            state.clear_decrypted();
        }
        result
    }

    fn enter_awaiting(&self) -> Result<()> {
        let mut state = self.state.lock().expect("key state lock");
        if state.phase != KeyPhase::Idle {
            return Err(operation_in_progress(state.phase));
        }
        state.phase = KeyPhase::AwaitingPassphrase;
        Ok(())
    }

    fn enter_work(&self, phase: KeyPhase) -> Result<()> {
        let mut state = self.state.lock().expect("key state lock");
        match state.phase {
            KeyPhase::Idle | KeyPhase::AwaitingPassphrase => {
                state.phase = phase;
                Ok(())
            }
            other => Err(operation_in_progress(other)),
        }
    }

    fn finish_work<T>(&self, result: &Result<T>) {
        let mut state = self.state.lock().expect("key state lock");
        state.phase = KeyPhase::Idle;
        if let Err(e) = result {
            debug!("key operation failed: {e}");
        }
    }

    /// Record a live decrypted key and (re)arm the expiry timer. Re-arming
    /// replaces any pending timer; expirations never stack.
    fn mark_decrypted(&self, public_key: Option<String>) {
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(self.auto_delete_interval)
                .unwrap_or_else(|_| chrono::Duration::days(365 * 100));

        let mut state = self.state.lock().expect("key state lock");
        state.decrypted_at = Some(now);
        state.expires_at = Some(expires_at);
        if public_key.is_some() {
            state.public_key = public_key;
        }

        if let Some(task) = state.expiry_task.take() {
            task.abort();
        }
        let manager = self.clone();
        let interval = self.auto_delete_interval;
        state.expiry_task = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            manager.expire().await;
        }));
    }

    /// Timer-fired deletion: the same erasure path as [`Self::lock`], minus
    /// the cancellation (this task *is* the timer).
    async fn expire(&self) {
        info!(path = %self.key_path.display(), "auto-delete interval elapsed");
        if let Err(e) = fsutil::secure_delete(&self.key_path).await {
            warn!(path = %self.key_path.display(), "auto-delete failed: {e}");
        }
        let mut state = self.state.lock().expect("key state lock");
        state.clear_decrypted();
        state.expiry_task = None;
    }
}

fn operation_in_progress(phase: KeyPhase) -> AppError {
    AppError::new(
        ErrorKind::KeyManagement,
        "Another key operation is in progress",
    )
    .with_context("phase", format!("{phase:?}"))
}

/// Pull the public identifier out of key-file material when the generator
/// annotated it. Material holding only the private token yields `None`.
fn public_key_from_material(material: &str) -> Option<String> {
    material
        .lines()
        .find_map(|line| line.strip_prefix("# public key: "))
        .map(|s| s.trim().to_string())
}
