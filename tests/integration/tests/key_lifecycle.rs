//! End-to-end key lifecycle against fake external tools.

use std::time::Duration;

use secretseal_core::SecretString;
use secretseal_integration_tests::FakeTools;
use secretseal_keys::KeyLifecycleManager;

fn manager(tools: &FakeTools, interval: Duration) -> KeyLifecycleManager {
    KeyLifecycleManager::new(
        tools.key_tool(),
        tools.key_path(),
        tools.encrypted_key_path(),
        interval,
    )
}

#[tokio::test]
async fn test_generate_lock_unlock_round_trip() {
    let tools = FakeTools::install();
    let keys = manager(&tools, Duration::from_secs(60));
    let passphrase = SecretString::from("correct-horse".to_string());

    let pair = keys.generate(&passphrase).await.unwrap();
    assert!(pair.public_key.starts_with("age1"));
    assert!(keys.is_decrypted());
    assert!(keys.has_encrypted_key());
    let plain = std::fs::read_to_string(tools.key_path()).unwrap();
    assert!(plain.contains("AGE-SECRET-KEY-"));

    keys.lock().await.unwrap();
    assert!(!keys.is_decrypted());
    assert!(!tools.key_path().exists());
    // The wrapped key survives the lock.
    assert!(keys.has_encrypted_key());

    keys.unlock(&passphrase).await.unwrap();
    assert!(keys.is_decrypted());
    assert_eq!(std::fs::read_to_string(tools.key_path()).unwrap(), plain);
}

#[tokio::test]
async fn test_wrong_passphrase_is_security_error() {
    let tools = FakeTools::install();
    let keys = manager(&tools, Duration::from_secs(60));

    keys.generate(&SecretString::from("right".to_string()))
        .await
        .unwrap();
    keys.lock().await.unwrap();

    let err = keys
        .unlock(&SecretString::from("wrong".to_string()))
        .await
        .unwrap_err();
    assert!(err.is_security());
    assert!(!keys.is_decrypted());
    assert!(!tools.key_path().exists());
}

#[tokio::test]
async fn test_decrypted_key_expires_and_is_erased() {
    let tools = FakeTools::install();
    let keys = manager(&tools, Duration::from_millis(300));

    keys.generate(&SecretString::from("pass".to_string()))
        .await
        .unwrap();
    assert!(tools.key_path().exists());

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(!keys.is_decrypted());
    assert!(!tools.key_path().exists());
    // Unlocking again still works from the wrapped copy.
    keys.unlock(&SecretString::from("pass".to_string()))
        .await
        .unwrap();
    assert!(keys.is_decrypted());
}
