//! Backup-and-rollback safety net for destructive file mutations.
//!
//! [`BackupStore`] keeps timestamped pre-mutation copies with per-basename
//! retention; [`TransactionManager`] brackets mutations with
//! snapshot/commit/rollback and serializes operations per path.

pub mod backup;
pub mod lock;
pub mod transaction;

pub use backup::{BackupStore, DEFAULT_MAX_BACKUPS};
pub use lock::PathLocks;
pub use transaction::{BackupRecord, Transaction, TransactionManager, TransactionState};
