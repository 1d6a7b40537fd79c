//! Document lifecycle: create, CAS, remove, epochs, patch retention.

use crate::common::*;
use docfeed::{DocumentRecord, PatchOp, WriteOptions};
use serde_json::json;
use std::sync::{Arc, Barrier};
use std::thread;

fn version_of(store: &DocumentStore, key: &str) -> Version {
    store.get_with_version(key).unwrap().version
}

#[test]
fn example_scenario() {
    let store = fresh_store();

    assert!(store.create("user:1", json!({"name": "Ann"})).unwrap());
    assert_eq!(store.get("user:1").unwrap(), Some(json!({"name": "Ann"})));
    let v1 = version_of(&store, "user:1");
    assert_eq!(v1.minor, 1);

    let mut next = store.get("user:1").unwrap().unwrap();
    next["age"] = json!(30);
    assert!(store.set_if_version("user:1", v1, next).unwrap());
    let v2 = version_of(&store, "user:1");
    assert_eq!(v2, Version::new(v1.major, 2));

    assert!(store.remove("user:1").unwrap());
    assert_eq!(store.get("user:1").unwrap(), None);
    let tomb = store.get_with_version("user:1").unwrap();
    assert_eq!(tomb.value, None);
    assert_eq!(tomb.version, Version::new(v1.major, 3));

    assert!(store.create("user:1", json!({"name": "Bob"})).unwrap());
    let v4 = version_of(&store, "user:1");
    assert_eq!(v4.minor, 1);
    assert!(v4.major > v1.major);
}

#[test]
fn create_succeeds_only_when_absent_or_tombstoned() {
    let store = fresh_store();
    assert!(store.create("k", json!(1)).unwrap());
    assert!(!store.create("k", json!(2)).unwrap());
    assert_eq!(store.get("k").unwrap(), Some(json!(1)));

    store.remove("k").unwrap();
    assert!(store.create("k", json!(3)).unwrap());
    assert_eq!(store.get("k").unwrap(), Some(json!(3)));
}

#[test]
fn every_mutation_bumps_minor_by_one() {
    let store = fresh_store();
    store.create("k", json!({"n": 0})).unwrap();
    let first = version_of(&store, "k");

    for n in 1..=25 {
        let before = version_of(&store, "k");
        assert!(store.set_if_version("k", before, json!({"n": n})).unwrap());
        let after = version_of(&store, "k");
        assert_eq!(after.major, first.major);
        assert_eq!(after.minor, before.minor + 1);
    }
}

#[test]
fn noop_write_is_invisible() {
    let store = fresh_store();
    store.create("k", json!({"a": 1, "b": [true, null]})).unwrap();
    let before = store.record("k").unwrap().unwrap();

    // Same content, different key order and number spelling
    let same: Value = serde_json::from_str(r#"{"b": [true, null], "a": 1.0}"#).unwrap();
    assert!(store.set_if_version("k", before.version, same).unwrap());

    let after = store.record("k").unwrap().unwrap();
    assert_eq!(after.version, before.version);
    assert_eq!(after.patch_log, before.patch_log);
}

#[test]
fn tombstone_history_carries_into_next_epoch() {
    let store = store_with_capacity(20);
    store.create("k", json!("a")).unwrap();
    store.remove("k").unwrap();
    store.create("k", json!("b")).unwrap();

    let record: DocumentRecord = store.record("k").unwrap().unwrap();
    assert_eq!(record.patch_log.len(), 3);
    assert_eq!(
        record.patch_log[1].ops,
        vec![PatchOp::Remove {
            path: "/root".into()
        }]
    );
    assert!(record.patch_log[2].version.major > record.patch_log[1].version.major);
}

#[test]
fn patch_log_keeps_most_recent_entries() {
    let store = store_with_capacity(20);
    store.create("k", json!(0)).unwrap();
    for n in 1..50 {
        let v = version_of(&store, "k");
        store.set_if_version("k", v, json!(n)).unwrap();
    }
    let record = store.record("k").unwrap().unwrap();
    assert_eq!(record.patch_log.len(), 20);
    assert_eq!(record.patch_log.first().unwrap().version.minor, 31);
    assert_eq!(record.patch_log.last().unwrap().version, record.version);
}

#[test]
fn operation_ids_flow_into_patches() {
    let store = fresh_store();
    store
        .create_with("k", json!(1), WriteOptions::with_operation_id("create-1"))
        .unwrap();
    store
        .remove_with("k", WriteOptions::with_operation_id("remove-1"))
        .unwrap();
    let ids: Vec<Option<String>> = store
        .record("k")
        .unwrap()
        .unwrap()
        .patch_log
        .into_iter()
        .map(|p| p.operation_id)
        .collect();
    assert_eq!(ids, vec![Some("create-1".into()), Some("remove-1".into())]);
}

#[test]
fn concurrent_creates_have_one_winner() {
    let store = fresh_store();
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.create("shared", json!({"writer": i})).unwrap()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|created| *created)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(version_of(&store, "shared").minor, 1);
}

#[test]
fn concurrent_cas_increments_are_serialized() {
    let store = fresh_store();
    store.create("counter", json!(0)).unwrap();
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut done = 0;
                while done < 25 {
                    let current = store.get_with_version("counter").unwrap();
                    let n = current.value.unwrap().as_i64().unwrap();
                    if store
                        .set_if_version("counter", current.version, json!(n + 1))
                        .unwrap()
                    {
                        done += 1;
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let final_state = store.get_with_version("counter").unwrap();
    assert_eq!(final_state.value, Some(json!(100)));
    assert_eq!(final_state.version.minor, 101);
}
