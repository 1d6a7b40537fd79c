//! Long-poll: backlog, timeout, wakeup, subscribe-before-scan.

use crate::common::*;
use serde_json::json;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn entry(key: &str, version: Version) -> (String, Version) {
    (key.to_string(), version)
}

#[test]
fn idle_poll_returns_empty_after_timeout_no_sooner() {
    let store = fresh_store();
    store.create("k", json!(1)).unwrap();
    let v = store.get_with_version("k").unwrap().version;

    let start = Instant::now();
    let changes = store
        .poll(&[entry("k", v)], Some(Duration::from_millis(150)))
        .unwrap();
    assert!(changes.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[test]
fn poll_on_never_written_key_sees_creation() {
    let store = fresh_store();
    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            store.create("later", json!({"hello": "world"})).unwrap();
        })
    };
    let changes = store
        .poll(&[entry("later", Version::NONE)], Some(Duration::from_secs(20)))
        .unwrap();
    writer.join().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].0, "later");
    assert_eq!(changes[0].1[0].version.minor, 1);
}

#[test]
fn racing_update_wakes_poll_well_before_timeout() {
    let store = fresh_store();
    store.create("k", json!({"n": 1})).unwrap();
    let v = store.get_with_version("k").unwrap().version;
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            thread::sleep(Duration::from_millis(20));
            store.set_if_version("k", v, json!({"n": 2})).unwrap()
        })
    };

    barrier.wait();
    let start = Instant::now();
    let changes = store
        .poll(&[entry("k", v)], Some(Duration::from_secs(30)))
        .unwrap();
    assert!(writer.join().unwrap());
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(changes[0].1[0].version, v.next_minor());
}

#[test]
fn backlog_covers_every_stale_key() {
    let store = fresh_store();
    for key in ["a", "b", "c"] {
        store.create(key, json!(0)).unwrap();
    }
    let b = store.get_with_version("b").unwrap().version;
    let c = store.get_with_version("c").unwrap().version;
    store.set_if_version("c", c, json!(1)).unwrap();

    let changes = store
        .poll(
            &[entry("a", Version::NONE), entry("b", b), entry("c", c)],
            Some(Duration::from_secs(30)),
        )
        .unwrap();
    let keys: Vec<&str> = changes.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["a", "c"]);
    assert_eq!(changes[1].1.len(), 1);
}

#[test]
fn wakeup_carries_only_the_triggering_key() {
    let store = fresh_store();
    store.create("a", json!(0)).unwrap();
    store.create("b", json!(0)).unwrap();
    let a = store.get_with_version("a").unwrap().version;
    let b = store.get_with_version("b").unwrap().version;

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            store.set_if_version("b", b, json!(1)).unwrap();
        })
    };
    let changes = store
        .poll(&[entry("a", a), entry("b", b)], Some(Duration::from_secs(20)))
        .unwrap();
    writer.join().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].0, "b");
}

#[test]
fn writes_to_other_keys_do_not_wake() {
    let store = fresh_store();
    store.create("watched", json!(0)).unwrap();
    let v = store.get_with_version("watched").unwrap().version;

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for n in 0..5 {
                store.create(&format!("other:{}", n), json!(n)).unwrap();
                thread::sleep(Duration::from_millis(10));
            }
        })
    };
    let start = Instant::now();
    let changes = store
        .poll(&[entry("watched", v)], Some(Duration::from_millis(200)))
        .unwrap();
    writer.join().unwrap();
    assert!(changes.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[test]
fn no_patch_is_lost_under_continuous_writes() {
    // A poller that always resumes from the last version it saw must observe
    // every minor exactly once.
    let store = store_with_capacity(1_000);
    store.create("k", json!(0)).unwrap();
    let start = store.get_with_version("k").unwrap().version;

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for n in 1..=100 {
                let v = store.get_with_version("k").unwrap().version;
                assert!(store.set_if_version("k", v, json!(n)).unwrap());
            }
        })
    };

    let mut seen = vec![start.minor];
    let mut since = start;
    while since.minor < 101 {
        let changes = store
            .poll(&[entry("k", since)], Some(Duration::from_secs(5)))
            .unwrap();
        for (_, patches) in changes {
            for patch in patches {
                assert_eq!(patch.version, since.next_minor());
                seen.push(patch.version.minor);
                since = patch.version;
            }
        }
    }
    writer.join().unwrap();
    assert_eq!(seen, (1..=101).collect::<Vec<u64>>());
}

#[test]
fn caller_timeout_is_clamped_to_configured_max() {
    let config = StoreConfig {
        default_poll_timeout_ms: 50,
        max_poll_timeout_ms: 100,
        ..StoreConfig::default()
    };
    let store = DocumentStore::open_with_config(Arc::new(MemoryStore::new()), config).unwrap();
    store.create("k", json!(0)).unwrap();
    let v = store.get_with_version("k").unwrap().version;

    let start = Instant::now();
    assert!(store
        .poll(&[entry("k", v)], Some(Duration::from_secs(3_600)))
        .unwrap()
        .is_empty());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(30));

    let start = Instant::now();
    assert!(store.poll(&[entry("k", v)], None).unwrap().is_empty());
    assert!(start.elapsed() >= Duration::from_millis(50));
}
