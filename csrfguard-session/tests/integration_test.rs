//! Integration tests for csrfguard-session

use csrfguard_session::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_store_as_trait_object() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
    let session = store.create(Some(Duration::from_secs(60))).await.unwrap();

    store
        .set_attribute(&session.id, "token", json!("abc"))
        .await
        .unwrap();

    let loaded = store.get(&session.id).await.unwrap().unwrap();
    assert_eq!(loaded.attribute::<String>("token"), Some("abc".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_to_distinct_keys_survive() {
    let store = Arc::new(MemorySessionStore::default());
    let session = store.create(None).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        let id = session.id.clone();
        handles.push(tokio::spawn(async move {
            store
                .set_attribute(&id, &format!("key-{i}"), json!(i))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let loaded = store.get(&session.id).await.unwrap().unwrap();
    assert_eq!(loaded.attributes.len(), 32);
}

#[tokio::test]
async fn test_custom_ttl_clamped_to_max() {
    let config = SessionConfig::default()
        .with_default_ttl(Duration::from_secs(30))
        .with_max_ttl(Duration::from_secs(60));
    let store = MemorySessionStore::new(config).unwrap();

    let session = store.create(Some(Duration::from_secs(3600))).await.unwrap();
    let lifetime = session.expires_at - session.created_at;
    assert!(lifetime <= chrono::Duration::seconds(60));
}

#[test]
fn test_invalid_config_rejected() {
    let config = SessionConfig::default().with_default_ttl(Duration::ZERO);
    assert!(MemorySessionStore::new(config).is_err());
}
