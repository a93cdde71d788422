//! Transactions: snapshot-before-mutate, commit, rollback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use secretseal_core::error::Result;
use secretseal_core::fsutil;

use crate::backup::BackupStore;
use crate::lock::PathLocks;

/// One backed-up file inside a transaction.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a transaction. Exactly one terminal state is ever reached;
/// commit and rollback are no-ops once terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

/// Groups one or more file mutations into an atomic unit backed by
/// pre-mutation snapshots.
#[derive(Debug)]
pub struct Transaction {
    records: Vec<BackupRecord>,
    state: TransactionState,
}

impl Transaction {
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// The backup mapping still recorded. Empty after commit.
    pub fn records(&self) -> &[BackupRecord] {
        &self.records
    }

    /// Finalize the transaction: the mapping is discarded, but the backups
    /// taken during begin stay on disk as recovery history.
    pub fn commit(&mut self) {
        if self.state != TransactionState::Open {
            return;
        }
        debug!(files = self.records.len(), "committing transaction");
        self.records.clear();
        self.state = TransactionState::Committed;
    }

    /// Restore every recorded file from its snapshot.
    ///
    /// Failures are aggregated: every restorable file is still restored, and
    /// the last failure is returned so a partial rollback is reported rather
    /// than hidden. Terminal either way.
    pub async fn rollback(&mut self) -> Result<()> {
        if self.state != TransactionState::Open {
            return Ok(());
        }
        self.state = TransactionState::RolledBack;

        let mut last_err = None;
        for record in &self.records {
            if !fsutil::file_exists(&record.backup_path) {
                continue;
            }
            match fsutil::copy_private(&record.backup_path, &record.original_path).await {
                Ok(()) => {
                    debug!(path = %record.original_path.display(), "rolled back file");
                }
                Err(e) => {
                    let e = e.with_context("path", record.original_path.display().to_string());
                    warn!(path = %record.original_path.display(), "rollback restore failed: {e}");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Creates transactions over a shared [`BackupStore`] and serializes
/// operations per path.
#[derive(Debug)]
pub struct TransactionManager {
    store: Arc<BackupStore>,
    locks: PathLocks,
}

impl TransactionManager {
    pub fn new(store: BackupStore) -> Self {
        Self {
            store: Arc::new(store),
            locks: PathLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<BackupStore> {
        &self.store
    }

    /// Acquire the single-flight lock for `path`. Hold the returned guard
    /// across the whole begin/mutate/commit-or-rollback bracket.
    pub async fn lock_path(&self, path: &Path) -> OwnedMutexGuard<()> {
        self.locks.acquire(path).await
    }

    /// Open a transaction by snapshotting every existing path.
    ///
    /// Non-existent paths are skipped: they cover operations that create
    /// their target. If any backup fails, the snapshots already taken are
    /// rolled back and the triggering error is returned.
    pub async fn begin(&self, paths: &[&Path]) -> Result<Transaction> {
        let mut tx = Transaction {
            records: Vec::new(),
            state: TransactionState::Open,
        };

        for path in paths {
            if !fsutil::file_exists(path) {
                debug!(path = %path.display(), "skipping backup of non-existent file");
                continue;
            }

            match self.store.backup_file(path).await {
                Ok(backup_path) => tx.records.push(BackupRecord {
                    original_path: path.to_path_buf(),
                    backup_path,
                    created_at: Utc::now(),
                }),
                Err(e) => {
                    let e = match tx.rollback().await {
                        Ok(()) => e,
                        Err(rollback_err) => e.with_rollback_failure(&rollback_err),
                    };
                    return Err(e);
                }
            }
        }

        Ok(tx)
    }
}
