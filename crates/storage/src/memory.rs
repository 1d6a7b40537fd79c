//! MemoryStore: BTreeMap-based ordered storage
//!
//! - `BTreeMap<String, Vec<u8>>` for ordered key storage
//! - `parking_lot::RwLock` for thread-safe access; readers never block each other

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use docfeed_core::Result;

use crate::traits::OrderedStore;

/// In-memory ordered store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().remove(key).is_some())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let data = self.data.read();
        let range = data.range::<str, _>((Bound::Included(prefix), Bound::Unbounded));
        Ok(range
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.data.read().len())
    }
}
