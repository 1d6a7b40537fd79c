//! Fault injection for storage-dependent tests
//!
//! [`FaultyStore`] wraps any [`OrderedStore`] and fails selected operations
//! on demand, so callers can verify that storage errors propagate unchanged.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use docfeed_core::{Error, Result};
use tracing::trace;

use crate::traits::OrderedStore;

/// Operation kinds that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Point read
    Get,
    /// Point write
    Put,
    /// Delete
    Delete,
    /// Ordered iteration
    Scan,
}

/// Store wrapper that injects failures
pub struct FaultyStore<S> {
    inner: Arc<S>,
    fail_get: AtomicBool,
    fail_put: AtomicBool,
    fail_delete: AtomicBool,
    fail_scan: AtomicBool,
    puts: AtomicU64,
}

impl<S: OrderedStore> FaultyStore<S> {
    /// Wrap a store; nothing fails until asked to
    pub fn new(inner: Arc<S>) -> Self {
        FaultyStore {
            inner,
            fail_get: AtomicBool::new(false),
            fail_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_scan: AtomicBool::new(false),
            puts: AtomicU64::new(0),
        }
    }

    /// Make `op` fail (or succeed again)
    pub fn set_failing(&self, op: StoreOp, failing: bool) {
        self.flag(op).store(failing, Ordering::SeqCst);
    }

    /// Number of successful puts so far
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// The wrapped store
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    fn flag(&self, op: StoreOp) -> &AtomicBool {
        match op {
            StoreOp::Get => &self.fail_get,
            StoreOp::Put => &self.fail_put,
            StoreOp::Delete => &self.fail_delete,
            StoreOp::Scan => &self.fail_scan,
        }
    }

    fn check(&self, op: StoreOp) -> Result<()> {
        if self.flag(op).load(Ordering::SeqCst) {
            trace!(?op, "injecting storage failure");
            return Err(Error::Storage(format!("injected {:?} failure", op)));
        }
        Ok(())
    }
}

impl<S: OrderedStore> OrderedStore for FaultyStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check(StoreOp::Get)?;
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check(StoreOp::Put)?;
        self.inner.put(key, value)?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.check(StoreOp::Delete)?;
        self.inner.delete(key)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        self.check(StoreOp::Scan)?;
        self.inner.scan_prefix(prefix)
    }
}
