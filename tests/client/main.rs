//! Client integration tests: optimistic updates and multiplexed subscriptions
//! running against a real store through the JSON executor.

#[path = "../common/mod.rs"]
mod common;

mod config;
mod update;
