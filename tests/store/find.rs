//! `find`: linear scan, filters, ordering, pagination.

use crate::common::*;
use docfeed::{field, key, value, Direction, Error, FieldPath, Filter};
use serde_json::json;

fn seeded() -> std::sync::Arc<DocumentStore> {
    let store = fresh_store();
    store.create("user:3", json!({"name": "Cy", "age": 30, "tags": ["a"]})).unwrap();
    store.create("user:1", json!({"name": "ann", "age": 41, "nick": null})).unwrap();
    store.create("user:2", json!({"name": "Bo", "age": "30"})).unwrap();
    store.create("team:1", json!({"name": "Ops"})).unwrap();
    store.create("user:9", json!({"name": "Gone", "age": 99})).unwrap();
    store.remove("user:9").unwrap();
    store
}

fn keys(docs: &[Document]) -> Vec<&str> {
    docs.iter().map(|d| d.key.as_str()).collect()
}

#[test]
fn all_live_documents_in_key_order() {
    let store = seeded();
    let docs = store
        .find(&Query::new(key().starts_with("")).order_by(FieldPath::key(), Direction::Asc))
        .unwrap();
    assert_eq!(keys(&docs), vec!["team:1", "user:1", "user:2", "user:3"]);
}

#[test]
fn comparisons_are_type_sensitive() {
    let store = seeded();
    let docs = store
        .find(&Query::new(value().at("age").eq(30)).order_by(FieldPath::key(), Direction::Asc))
        .unwrap();
    assert_eq!(keys(&docs), vec!["user:3"]);

    let docs = store
        .find(&Query::new(value().at("age").gte("30")))
        .unwrap();
    assert_eq!(keys(&docs), vec!["user:2"]);

    // Mixed-type range comparisons never match and never fail
    let docs = store.find(&Query::new(value().at("name").gt(0))).unwrap();
    assert!(docs.is_empty());
}

#[test]
fn exists_and_is_null() {
    let store = seeded();
    let docs = store.find(&Query::new(value().at("nick").exists())).unwrap();
    assert_eq!(keys(&docs), vec!["user:1"]);

    let docs = store.find(&Query::new(value().at("nick").is_null())).unwrap();
    assert_eq!(keys(&docs), vec!["user:1"]);

    let docs = store
        .find(&Query::new(Filter::not(value().at("age").exists())))
        .unwrap();
    assert_eq!(keys(&docs), vec!["team:1"]);
}

#[test]
fn boolean_combinators() {
    let store = seeded();
    let both = Filter::and(vec![
        key().starts_with("user:"),
        value().at("age").lt(35),
    ]);
    assert_eq!(keys(&store.find(&Query::new(both)).unwrap()), vec!["user:3"]);

    let either = Filter::or(vec![
        key().eq("team:1"),
        value().at("age").gt(40),
    ]);
    let docs = store
        .find(&Query::new(either).order_by(FieldPath::key(), Direction::Asc))
        .unwrap();
    assert_eq!(keys(&docs), vec!["team:1", "user:1"]);
}

#[test]
fn regex_matching() {
    let store = seeded();
    let docs = store
        .find(&Query::new(value().at("name").matches("^[A-C]")).order_by(FieldPath::key(), Direction::Asc))
        .unwrap();
    assert_eq!(keys(&docs), vec!["user:2", "user:3"]);

    let docs = store
        .find(&Query::new(value().at("name").matches_ignore_case("^ANN$")))
        .unwrap();
    assert_eq!(keys(&docs), vec!["user:1"]);

    let err = store
        .find(&Query::new(value().at("name").matches("(")))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPattern { .. }));
}

#[test]
fn nested_paths_and_array_indices() {
    let store = seeded();
    let docs = store
        .find(&Query::new(field(FieldPath::value(["tags", "0"])).eq("a")))
        .unwrap();
    assert_eq!(keys(&docs), vec!["user:3"]);
}

#[test]
fn composite_sort_skip_limit() {
    let store = seeded();
    let query = Query::new(key().starts_with("user:"))
        .order_by(FieldPath::value(["age"]), Direction::Desc)
        .order_by(FieldPath::key(), Direction::Asc)
        .skip(1)
        .limit(2);
    let docs = store.find(&query).unwrap();
    // strings sort above numbers: "30" (user:2), 41 (user:1), 30 (user:3)
    assert_eq!(keys(&docs), vec!["user:1", "user:3"]);
}

#[test]
fn unknown_operator_is_an_error_not_an_empty_result() {
    let store = seeded();
    let filter: Filter =
        serde_json::from_value(json!({"operator": "within", "path": ["value", "age"], "value": 3}))
            .unwrap();
    let err = store.find(&Query::new(filter)).unwrap_err();
    assert_eq!(
        err,
        Error::UnsupportedOperator {
            operator: "within".into()
        }
    );
}
