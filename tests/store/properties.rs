//! Property tests over random write sequences.

use crate::common::*;
use docfeed::{apply_patch, key, Direction, FieldPath};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Op {
    Create(u8, i64),
    Update(u8, i64),
    Remove(u8),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, any::<i64>()).prop_map(|(k, n)| Op::Create(k, n)),
        (0u8..4, any::<i64>()).prop_map(|(k, n)| Op::Update(k, n)),
        (0u8..4).prop_map(Op::Remove),
    ]
}

fn key_name(k: u8) -> String {
    format!("doc:{}", k)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The store agrees with a plain map model, versions follow the epoch
    /// rules, and replaying each key's patch log rebuilds its value.
    #[test]
    fn store_matches_model(ops in prop::collection::vec(arb_op(), 1..40)) {
        let store = store_with_capacity(1_000);
        let mut model: BTreeMap<String, i64> = BTreeMap::new();
        let mut last_version: BTreeMap<String, Version> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Create(k, n) => {
                    let key = key_name(k);
                    let created = store.create(&key, json!({"n": n})).unwrap();
                    prop_assert_eq!(created, !model.contains_key(&key));
                    if created {
                        let v = store.get_with_version(&key).unwrap().version;
                        prop_assert_eq!(v.minor, 1);
                        if let Some(prev) = last_version.get(&key) {
                            prop_assert!(v.major > prev.major);
                        }
                        model.insert(key.clone(), n);
                        last_version.insert(key, v);
                    }
                }
                Op::Update(k, n) => {
                    let key = key_name(k);
                    let current = store.get_with_version(&key).unwrap();
                    if current.value.is_none() {
                        continue;
                    }
                    let updated = store.set_if_version(&key, current.version, json!({"n": n})).unwrap();
                    prop_assert!(updated);
                    let v = store.get_with_version(&key).unwrap().version;
                    if model.get(&key) == Some(&n) {
                        prop_assert_eq!(v, current.version);
                    } else {
                        prop_assert_eq!(v, current.version.next_minor());
                    }
                    model.insert(key.clone(), n);
                    last_version.insert(key, v);
                }
                Op::Remove(k) => {
                    let key = key_name(k);
                    let before = store.get_with_version(&key).unwrap().version;
                    let removed = store.remove(&key).unwrap();
                    prop_assert_eq!(removed, model.remove(&key).is_some());
                    if removed {
                        let v = store.get_with_version(&key).unwrap().version;
                        prop_assert_eq!(v, before.next_minor());
                        last_version.insert(key, v);
                    }
                }
            }
        }

        let docs = store
            .find(&Query::new(key().starts_with("")).order_by(FieldPath::key(), Direction::Asc))
            .unwrap();
        let found: BTreeMap<String, i64> = docs
            .into_iter()
            .map(|d| (d.key, d.value["n"].as_i64().unwrap()))
            .collect();
        prop_assert_eq!(&found, &model);

        for key in last_version.keys() {
            let record = store.record(key).unwrap().unwrap();
            let mut rebuilt = None;
            for patch in &record.patch_log {
                rebuilt = apply_patch(rebuilt, &patch.ops).unwrap();
            }
            prop_assert_eq!(rebuilt, record.value);
        }
    }
}
