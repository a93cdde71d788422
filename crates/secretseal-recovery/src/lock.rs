//! Single-flight locks keyed by normalized path.
//!
//! At most one transaction may be open against a given file at any time.
//! Callers acquire the path's lock before `begin` and hold it through
//! commit or rollback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutexes keyed by normalized path.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `path`, waiting if another operation holds it.
    ///
    /// The guard is owned so it can be held across await points for the
    /// whole begin/mutate/commit-or-rollback bracket.
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let key = normalize(path);
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

/// Normalize a path so distinct spellings of the same file share one lock.
///
/// Canonicalization requires the file to exist; for paths that will be
/// created by the pending operation, fall back to an absolute lexical form.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
