//! docfeed - embedded versioned JSON document store with a change feed
//!
//! docfeed stores one JSON document per key. Every accepted write produces a
//! `(major, minor)` version and a structural patch; watchers long-poll for
//! patches newer than the versions they hold, and a client-side hub
//! multiplexes many per-key subscriptions onto one poll loop.
//!
//! # Quick Start
//!
//! ```ignore
//! use docfeed::{ClientConfig, DocumentClient, DocumentStore, Executor};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let executor = Arc::new(Executor::new(Arc::new(DocumentStore::in_memory())));
//! let client = DocumentClient::local(executor, ClientConfig::default())?;
//!
//! client.create("user:1", json!({"name": "Ann"}))?;
//! client.update("user:1", |doc| {
//!     let mut doc = doc.cloned().unwrap_or_default();
//!     doc["age"] = json!(30);
//!     doc
//! })?;
//!
//! let watch = client.subscribe("user:1")?;
//! let snapshot = watch.recv()?;
//! ```
//!
//! # Crates
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `docfeed-core` | Version, records, diff/patch, filters and queries |
//! | `docfeed-storage` | Ordered key-value substrate |
//! | `docfeed-engine` | DocumentStore, change notifier, config |
//! | `docfeed-executor` | Wire commands and the JSON boundary |
//! | `docfeed-client` | Transport, optimistic update, subscriptions |

pub use docfeed_core::filter::{field, key, value};
pub use docfeed_core::{
    apply_patch, diff_values, Direction, Document, DocumentRecord, Error, FieldPath, Filter,
    Limits, OrderBy, PatchEntry, PatchOp, Query, Result, Value, Version, VersionedValue,
};
pub use docfeed_storage::{MemoryStore, OrderedStore};
pub use docfeed_engine::{ChangeNotifier, DocumentStore, StoreConfig, VersionClock, WriteOptions};
pub use docfeed_executor::{Command, Executor, Output, Response};
pub use docfeed_client::{
    ClientConfig, ClientError, DocumentClient, DocumentSnapshot, LocalTransport, RetryPolicy,
    StoreApi, Subscription, SubscriptionHub,
};
