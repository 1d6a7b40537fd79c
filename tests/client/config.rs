//! Config files drive a store and client end to end.

use crate::common::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn config_files_shape_store_and_client() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join(docfeed_engine::CONFIG_FILE_NAME);
    let client_path = dir.path().join(docfeed_client::CLIENT_CONFIG_FILE_NAME);

    std::fs::write(
        &store_path,
        "patch_log_capacity = 3\ndefault_poll_timeout_ms = 100\nmax_poll_timeout_ms = 1000\n",
    )
    .unwrap();
    ClientConfig::write_default_if_missing(&client_path).unwrap();

    let store_config = StoreConfig::from_file(&store_path).unwrap();
    let store = Arc::new(
        DocumentStore::open_with_config(Arc::new(MemoryStore::new()), store_config).unwrap(),
    );
    let client_config = ClientConfig::from_file(&client_path).unwrap();
    assert_eq!(client_config, ClientConfig::default());
    assert_eq!(client_config.retry.initial_delay_ms, 20);

    let executor = Arc::new(Executor::new(Arc::clone(&store)));
    let client = DocumentClient::local(executor, client_config).unwrap();
    client.create("doc", json!({"n": 0})).unwrap();
    for n in 1..=5 {
        client.update("doc", |_| json!({"n": n})).unwrap();
    }

    let record = store.record("doc").unwrap().unwrap();
    let minors: Vec<u64> = record.patch_log.iter().map(|p| p.version.minor).collect();
    assert_eq!(minors, vec![4, 5, 6]);
}

#[test]
fn invalid_client_config_is_refused() {
    let err = ClientConfig::from_toml_str("[retry]\nmultiplier = 0.5\n").unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));

    let mut config = fast_client_config();
    config.retry.multiplier = f64::NAN;
    let store = fresh_store();
    let executor = Arc::new(Executor::new(store));
    assert!(matches!(
        DocumentClient::local(executor, config),
        Err(ClientError::Config(_))
    ));
}
