//! Store engine integration tests: lifecycle, queries, long-poll, properties.

#[path = "../common/mod.rs"]
mod common;

mod find;
mod lifecycle;
mod poll;
mod properties;
