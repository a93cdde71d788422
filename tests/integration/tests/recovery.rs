//! Backup retention and transactional rollback across the operation facade.

use std::sync::Arc;

use secretseal_core::PatternClassifier;
use secretseal_integration_tests::FakeTools;
use secretseal_ops::SecretOperationFacade;
use secretseal_recovery::{BackupStore, TransactionManager};
use tempfile::TempDir;

fn facade(tools: &FakeTools, backup_dir: std::path::PathBuf) -> SecretOperationFacade {
    SecretOperationFacade::new(
        tools.encryption_tool(),
        TransactionManager::new(BackupStore::new(backup_dir)),
        Arc::new(PatternClassifier::new()),
    )
}

#[tokio::test]
async fn test_retention_evicts_oldest_backup() {
    let dir = TempDir::new().unwrap();
    let backup_dir = dir.path().join("backups");
    std::fs::create_dir_all(&backup_dir).unwrap();

    // Seed old backups with synthetic timestamps below any real clock value.
    for ts in ["20240101-000001", "20240101-000002", "20240101-000003"] {
        std::fs::write(backup_dir.join(format!("secrets.yaml-{ts}.bak")), ts).unwrap();
    }

    let source = dir.path().join("secrets.yaml");
    std::fs::write(&source, "current").unwrap();

    let store = BackupStore::new(&backup_dir).with_max_backups(3);
    store.backup_file(&source).await.unwrap();

    let backups = store.list_backups("secrets.yaml").await.unwrap();
    assert_eq!(backups.len(), 3);
    // The oldest seeded backup is gone, the newest entry holds current bytes.
    assert!(!backup_dir.join("secrets.yaml-20240101-000001.bak").exists());
    let newest = backups.last().unwrap();
    assert_eq!(std::fs::read_to_string(newest).unwrap(), "current");
}

#[tokio::test]
async fn test_failed_operation_restores_original_bytes() {
    let tools = FakeTools::install();
    let dir = TempDir::new().unwrap();
    let facade = facade(&tools, dir.path().join("backups"));

    let path = dir.path().join("secrets.yaml");
    std::fs::write(&path, "plain: text\n").unwrap();

    // Decrypting a plaintext file fails inside the tool.
    let err = facade.decrypt(&path, true, None).await.unwrap_err();
    assert!(err.is_security());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "plain: text\n");
}

#[tokio::test]
async fn test_committed_operation_keeps_backup_on_disk() {
    let tools = FakeTools::install();
    let dir = TempDir::new().unwrap();
    let facade = facade(&tools, dir.path().join("backups"));

    let path = dir.path().join("secrets.yaml");
    std::fs::write(&path, "plain: text\n").unwrap();

    facade
        .encrypt(&path, &["age1abc".to_string()], true)
        .await
        .unwrap();
    assert!(std::fs::read_to_string(&path).unwrap().starts_with("#ENC"));

    // The pre-mutation snapshot stays available for manual recovery.
    let backups = facade
        .transactions()
        .store()
        .list_backups("secrets.yaml")
        .await
        .unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&backups[0]).unwrap(),
        "plain: text\n"
    );
}

#[tokio::test]
async fn test_encrypt_decrypt_round_trip_through_facade() {
    let tools = FakeTools::install();
    let dir = TempDir::new().unwrap();
    let facade = facade(&tools, dir.path().join("backups"));

    let path = dir.path().join("secrets.yaml");
    std::fs::write(&path, "plain: text\n").unwrap();

    facade
        .encrypt(&path, &["age1abc".to_string()], true)
        .await
        .unwrap();
    let status = facade.file_status(&path).await.unwrap();
    assert!(status.encrypted);
    assert_eq!(status.recipients, vec!["age1abc"]);

    facade.decrypt(&path, true, None).await.unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "plain: text\n");
}
