//! Store engine for docfeed
//!
//! This crate owns the authoritative document store:
//! - DocumentStore: point reads, CAS writes, `find` and long-poll `poll`
//! - ChangeNotifier: wakes blocked polls when patches are committed
//! - VersionClock: monotonic source of epoch majors
//! - StoreConfig: `docfeed.toml` configuration
//!
//! The persistence substrate is any `docfeed_storage::OrderedStore`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod notifier;
pub mod store;

pub use clock::VersionClock;
pub use config::{ConfigError, ConfigResult, StoreConfig, CONFIG_FILE_NAME};
pub use notifier::{ChangeNotifier, KeyedPatch, PatchSubscription};
pub use store::{Changes, DocumentStore, WriteOptions};
