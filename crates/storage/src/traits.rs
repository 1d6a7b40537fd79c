//! Ordered key-value substrate abstraction
//!
//! This trait enables swapping the in-memory map for a persistent engine
//! without touching the document store above it.

use docfeed_core::Result;

/// Ordered key-value storage
///
/// Values are opaque bytes. Iteration is in ascending key order.
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync). Implementations provide no
/// read-modify-write atomicity; callers serialize their own writes.
///
/// # Errors
///
/// Every method returns `Error::Storage` when the underlying medium fails.
pub trait OrderedStore: Send + Sync {
    /// Get the bytes stored under `key`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove `key`; returns whether it existed
    fn delete(&self, key: &str) -> Result<bool>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// All entries, in key order
    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.scan_prefix("")
    }

    /// Number of stored keys
    fn len(&self) -> Result<usize> {
        Ok(self.scan()?.len())
    }

    /// True if no key is stored
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
