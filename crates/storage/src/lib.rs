//! Storage layer for docfeed
//!
//! The document store treats its persistence substrate as an opaque ordered
//! key-value map with point get/put/delete and ordered iteration. This crate
//! defines that contract and its implementations:
//! - OrderedStore: the substrate trait
//! - MemoryStore: BTreeMap-based storage with RwLock
//! - FaultyStore: wrapper that injects I/O failures, for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod testing;
pub mod traits;

pub use memory::MemoryStore;
pub use testing::{FaultyStore, StoreOp};
pub use traits::OrderedStore;
