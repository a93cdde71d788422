//! Secretseal command-line interface.

pub mod render;
pub mod repl;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use secretseal_core::{paths, Config, PatternClassifier};
use secretseal_keys::{KeyLifecycleManager, KeyTool};
use secretseal_ops::{EncryptionTool, SecretOperationFacade};
use secretseal_recovery::{BackupStore, TransactionManager};

/// Secretseal - passphrase-protected keys and transactional secret files
#[derive(Parser)]
#[command(name = "secretseal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "SECRETSEAL_CONFIG")]
    pub config: Option<std::path::PathBuf>,
}

/// Wire up the components and hand control to the REPL.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.validate()?;

    let backup_dir = match &config.backup.dir {
        Some(dir) => dir.clone(),
        None => paths::default_backup_dir()?,
    };
    let store = BackupStore::new(backup_dir).with_max_backups(config.backup.max_backups);
    let transactions = TransactionManager::new(store);

    let keys = KeyLifecycleManager::new(
        KeyTool::new(),
        config.key_path.clone(),
        config.encrypted_key_path.clone(),
        config.auto_delete_interval,
    );
    // Adopt or note any key material left over from a previous run.
    keys.resync();
    if keys.is_decrypted() {
        info!("found a decrypted key from a previous session; expiry rearmed");
    }

    let tool = EncryptionTool::new().with_editor(config.editor_command.as_str());
    let facade = SecretOperationFacade::new(
        tool,
        transactions,
        Arc::new(PatternClassifier::new()),
    );

    repl::Repl::new(config, keys, facade).run().await
}
