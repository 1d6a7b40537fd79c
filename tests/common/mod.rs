//! Shared test utilities for all integration test suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

pub use docfeed::{
    ClientConfig, ClientError, Document, DocumentClient, DocumentStore, Executor, MemoryStore,
    PatchEntry, Query, RetryPolicy, StoreApi, StoreConfig, Value, Version, VersionedValue,
};
use docfeed_client::Changes;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (shown for failing tests).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Fixtures
// ============================================================================

/// In-memory store with the default configuration.
pub fn fresh_store() -> Arc<DocumentStore> {
    init_tracing();
    Arc::new(DocumentStore::in_memory())
}

/// In-memory store with a custom patch log capacity.
pub fn store_with_capacity(capacity: usize) -> Arc<DocumentStore> {
    init_tracing();
    let config = StoreConfig {
        patch_log_capacity: capacity,
        ..StoreConfig::default()
    };
    Arc::new(
        DocumentStore::open_with_config(Arc::new(MemoryStore::new()), config)
            .expect("Failed to open store"),
    )
}

/// Client config with short timeouts so background polls cycle quickly.
pub fn fast_client_config() -> ClientConfig {
    ClientConfig {
        retry: RetryPolicy {
            initial_delay_ms: 1,
            multiplier: 1.2,
            max_attempts: 0,
        },
        poll_timeout_ms: 200,
        poll_error_backoff_ms: 20,
    }
}

/// Client speaking JSON to an executor over `store`.
pub fn local_client(store: &Arc<DocumentStore>) -> DocumentClient {
    let executor = Arc::new(Executor::new(Arc::clone(store)));
    DocumentClient::local(executor, fast_client_config()).expect("Failed to build client")
}

/// Spin until `condition` holds or `timeout` passes; returns the final result.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ============================================================================
// CountingApi - StoreApi wrapper that records traffic
// ============================================================================

/// Forwards to an inner transport, counting fetches and recording polls.
pub struct CountingApi {
    inner: Arc<dyn StoreApi>,
    fetches: Mutex<HashMap<String, u64>>,
    polls: Mutex<Vec<Vec<(String, Version)>>>,
    poll_calls: AtomicU64,
}

impl CountingApi {
    pub fn new(inner: Arc<dyn StoreApi>) -> Self {
        CountingApi {
            inner,
            fetches: Mutex::new(HashMap::new()),
            polls: Mutex::new(Vec::new()),
            poll_calls: AtomicU64::new(0),
        }
    }

    /// `get_with_version` calls made for `key`.
    pub fn fetches(&self, key: &str) -> u64 {
        self.fetches.lock().get(key).copied().unwrap_or(0)
    }

    pub fn poll_calls(&self) -> u64 {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// Entry lists of every poll issued so far.
    pub fn poll_requests(&self) -> Vec<Vec<(String, Version)>> {
        self.polls.lock().clone()
    }

    /// Entry list of the most recent poll.
    pub fn last_poll(&self) -> Option<Vec<(String, Version)>> {
        self.polls.lock().last().cloned()
    }
}

impl StoreApi for CountingApi {
    fn get(&self, key: &str) -> docfeed_client::Result<Option<Value>> {
        self.inner.get(key)
    }

    fn get_with_version(&self, key: &str) -> docfeed_client::Result<VersionedValue> {
        *self.fetches.lock().entry(key.to_string()).or_insert(0) += 1;
        self.inner.get_with_version(key)
    }

    fn create(&self, key: &str, value: Value) -> docfeed_client::Result<bool> {
        self.inner.create(key, value)
    }

    fn remove(&self, key: &str) -> docfeed_client::Result<bool> {
        self.inner.remove(key)
    }

    fn set_if_version(
        &self,
        key: &str,
        version: Version,
        value: Value,
    ) -> docfeed_client::Result<bool> {
        self.inner.set_if_version(key, version, value)
    }

    fn find(&self, query: &Query) -> docfeed_client::Result<Vec<Document>> {
        self.inner.find(query)
    }

    fn poll(
        &self,
        entries: &[(String, Version)],
        timeout: Option<Duration>,
    ) -> docfeed_client::Result<Changes> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.polls.lock().push(entries.to_vec());
        self.inner.poll(entries, timeout)
    }
}
