//! DocumentClient: the application-facing entry point
//!
//! Bundles a transport, the optimistic update policy and a lazily started
//! [`SubscriptionHub`]. The hub's poll thread starts on the first
//! `subscribe`. Dropping the client closes its subscriptions and detaches the
//! poll thread; [`DocumentClient::shutdown`] also waits for it.

use parking_lot::Mutex;
use std::sync::Arc;

use docfeed_core::{Document, Limits, Query, Value, VersionedValue};
use docfeed_executor::Executor;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::subscription::{Subscription, SubscriptionHub};
use crate::transport::{LocalTransport, StoreApi};
use crate::update::optimistic_update;

/// Client for one document store
pub struct DocumentClient {
    api: Arc<dyn StoreApi>,
    config: ClientConfig,
    limits: Limits,
    hub: Mutex<Option<Arc<SubscriptionHub>>>,
}

impl DocumentClient {
    /// Client over any transport.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if `config` is invalid.
    pub fn new(api: Arc<dyn StoreApi>, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(DocumentClient {
            api,
            config,
            limits: Limits::default(),
            hub: Mutex::new(None),
        })
    }

    /// Client talking JSON to an in-process executor
    pub fn local(executor: Arc<Executor>, config: ClientConfig) -> Result<Self> {
        Self::new(Arc::new(LocalTransport::new(executor)), config)
    }

    /// Replace the limits applied to updated values
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Underlying transport
    pub fn api(&self) -> &Arc<dyn StoreApi> {
        &self.api
    }

    /// Current value of `key`
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.api.get(key)
    }

    /// Current value and version of `key`
    pub fn get_with_version(&self, key: &str) -> Result<VersionedValue> {
        self.api.get_with_version(key)
    }

    /// Create `key` if absent or deleted
    pub fn create(&self, key: &str, value: Value) -> Result<bool> {
        self.api.create(key, value)
    }

    /// Delete `key`
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.api.remove(key)
    }

    /// Query live documents
    pub fn find(&self, query: &Query) -> Result<Vec<Document>> {
        self.api.find(query)
    }

    /// Read-modify-write `key` with optimistic concurrency.
    ///
    /// `updater` may run several times; see [`optimistic_update`].
    pub fn update<F>(&self, key: &str, updater: F) -> Result<Value>
    where
        F: FnMut(Option<&Value>) -> Value,
    {
        optimistic_update(
            self.api.as_ref(),
            &self.config.retry,
            &self.limits,
            key,
            updater,
        )
    }

    /// Watch `key`, starting the subscription hub if needed
    pub fn subscribe(&self, key: &str) -> Result<Subscription> {
        self.hub()?.subscribe(key)
    }

    /// The subscription hub, started on first use
    pub fn hub(&self) -> Result<Arc<SubscriptionHub>> {
        let mut hub = self.hub.lock();
        if let Some(hub) = hub.as_ref() {
            return Ok(Arc::clone(hub));
        }
        let started = Arc::new(SubscriptionHub::start(Arc::clone(&self.api), &self.config)?);
        *hub = Some(Arc::clone(&started));
        Ok(started)
    }

    /// Stop the subscription hub, closing every subscription.
    ///
    /// Blocks until an in-flight background poll returns. Dropping the client
    /// closes subscriptions without waiting.
    pub fn shutdown(&self) {
        if let Some(hub) = self.hub.lock().take() {
            hub.shutdown();
        }
    }
}

impl Drop for DocumentClient {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.lock().take() {
            hub.close();
        }
    }
}
