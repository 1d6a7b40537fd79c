//! Optimistic updates through the client.

use crate::common::*;
use docfeed::{ClientError, LocalTransport};
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn example_scenario_via_client() {
    let store = fresh_store();
    let client = local_client(&store);

    assert!(client.create("user:1", json!({"name": "Ann"})).unwrap());
    assert!(!client.create("user:1", json!({"name": "Other"})).unwrap());

    let written = client
        .update("user:1", |current| {
            let mut doc = current.cloned().unwrap_or_else(|| json!({}));
            doc["age"] = json!(41);
            doc
        })
        .unwrap();
    assert_eq!(written, json!({"name": "Ann", "age": 41}));

    let read = client.get_with_version("user:1").unwrap();
    assert_eq!(read.value, Some(json!({"name": "Ann", "age": 41})));
    assert_eq!(read.version.minor, 2);

    assert!(client.remove("user:1").unwrap());
    assert!(!client.remove("user:1").unwrap());
    assert_eq!(client.get("user:1").unwrap(), None);
}

#[test]
fn update_of_missing_key_creates_it() {
    let store = fresh_store();
    let client = local_client(&store);

    let written = client
        .update("counter", |current| {
            assert!(current.is_none());
            json!({"count": 1})
        })
        .unwrap();
    assert_eq!(written, json!({"count": 1}));
    assert_eq!(store.get_with_version("counter").unwrap().version.minor, 1);
}

#[test]
fn concurrent_increments_are_never_lost() {
    let store = fresh_store();
    let client = Arc::new(local_client(&store));
    client.create("counter", json!({"count": 0})).unwrap();

    let threads = 8;
    let per_thread = 25;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for _ in 0..per_thread {
                    client
                        .update("counter", |current| {
                            let count = current
                                .and_then(|v| v["count"].as_i64())
                                .unwrap_or(0);
                            json!({"count": count + 1})
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let read = store.get_with_version("counter").unwrap();
    assert_eq!(read.value, Some(json!({"count": threads * per_thread})));
    assert_eq!(read.version.minor, 1 + (threads * per_thread) as u64);
}

#[test]
fn invalid_value_is_rejected_without_writing() {
    let store = fresh_store();
    let client = local_client(&store);
    client.create("doc", json!({"ok": true})).unwrap();
    let before = store.get_with_version("doc").unwrap();

    let err = client.update("", |_| json!(1)).unwrap_err();
    assert!(err.is_validation(), "got {:?}", err);

    let mut nested = json!(0);
    for _ in 0..200 {
        nested = json!([nested]);
    }
    let err = client.update("doc", |_| nested.clone()).unwrap_err();
    assert!(err.is_validation(), "got {:?}", err);
    assert_eq!(store.get_with_version("doc").unwrap(), before);
}

#[test]
fn capped_policy_reports_exhaustion() {
    let store = fresh_store();
    store.create("hot", json!(0)).unwrap();

    let mut config = fast_client_config();
    config.retry = config.retry.with_max_attempts(3);
    let transport = Arc::new(LocalTransport::new(Arc::new(Executor::new(Arc::clone(&store)))));
    let client = DocumentClient::new(transport, config).unwrap();

    // Every attempt races a direct write that bumps the version first.
    let mut calls = 0;
    let err = client
        .update("hot", |current| {
            calls += 1;
            let n = current.and_then(|v| v.as_i64()).unwrap_or(0);
            let v = store.get_with_version("hot").unwrap().version;
            store.set_if_version("hot", v, json!(n + 100)).unwrap();
            json!(n + 1)
        })
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::RetriesExhausted {
            key: "hot".to_string(),
            attempts: 3
        }
    );
    assert_eq!(calls, 3);
}

#[test]
fn null_document_survives_the_wire() {
    let store = fresh_store();
    let client = local_client(&store);

    assert!(client.create("nothing", Value::Null).unwrap());
    assert_eq!(client.get("nothing").unwrap(), Some(Value::Null));
    let read = client.get_with_version("nothing").unwrap();
    assert_eq!(read.value, Some(Value::Null));
    assert_eq!(read.version.minor, 1);

    let written = client
        .update("nothing", |current| {
            assert_eq!(current, Some(&Value::Null));
            json!({"filled": true})
        })
        .unwrap();
    assert_eq!(written, json!({"filled": true}));
}

#[test]
fn identity_update_leaves_version_and_log_untouched() {
    let store = fresh_store();
    let client = local_client(&store);
    client.create("k", json!({"a": 1, "b": [1, 2], "c": {"d": null}})).unwrap();

    let before = client.get_with_version("k").unwrap();
    let log_before = store.record("k").unwrap().unwrap().patch_log.len();

    // A watcher parked at the current version must not be woken
    let watcher = {
        let store = Arc::clone(&store);
        let version = before.version;
        thread::spawn(move || {
            store
                .poll(&[("k".to_string(), version)], Some(Duration::from_millis(300)))
                .unwrap()
        })
    };

    let written = client.update("k", |v| v.cloned().unwrap()).unwrap();
    assert_eq!(Some(written), before.value);

    let reordered: Value = serde_json::from_str(r#"{"c": {"d": null}, "b": [1, 2], "a": 1}"#).unwrap();
    client.update("k", |_| reordered.clone()).unwrap();

    assert_eq!(client.get_with_version("k").unwrap(), before);
    assert_eq!(store.record("k").unwrap().unwrap().patch_log.len(), log_before);
    assert!(watcher.join().unwrap().is_empty());
}
