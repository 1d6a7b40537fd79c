//! Client for docfeed
//!
//! - StoreApi / LocalTransport: blocking calls over the store's wire contract
//! - DocumentClient: reads, writes, optimistic `update`, `subscribe`
//! - optimistic_update: read-modify-CAS loop with exponential backoff
//! - SubscriptionHub: many per-key subscriptions multiplexed onto one poll loop
//! - ClientConfig / RetryPolicy: `docfeed-client.toml` configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod subscription;
pub mod transport;
pub mod update;

pub use client::DocumentClient;
pub use config::{Backoff, ClientConfig, RetryPolicy, CLIENT_CONFIG_FILE_NAME};
pub use error::{ClientError, Result};
pub use subscription::{DocumentSnapshot, InterestSet, Subscription, SubscriptionHub};
pub use transport::{Changes, LocalTransport, StoreApi};
pub use update::optimistic_update;
