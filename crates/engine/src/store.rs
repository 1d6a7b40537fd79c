//! DocumentStore: versioned JSON documents with a change feed
//!
//! ## Writes
//!
//! `create`, `remove` and `set_if_version` all funnel into one internal
//! "put" that runs under a single store-wide write lock:
//!
//! 1. read the current record
//! 2. pick the next version (new epoch if the key is absent or tombstoned,
//!    next minor otherwise)
//! 3. diff old and new whole values; an empty diff writes nothing
//! 4. persist the record with its patch log trimmed to capacity
//! 5. publish the patch to the [`ChangeNotifier`]
//!
//! Values are validated against [`Limits`] before the lock is taken and
//! before any storage I/O.
//!
//! ## Reads
//!
//! `get`, `get_with_version` and `find` go straight to the ordered store
//! and never wait on the write lock. Tombstones are never surfaced as live.
//!
//! ## Polling
//!
//! `poll` subscribes to the notifier, then scans the requested keys for
//! retained patches newer than the caller's versions. A non-empty scan returns
//! immediately; otherwise the call blocks until one matching patch is
//! committed or the timeout elapses.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use docfeed_core::{
    diff_values, now_micros, Document, DocumentRecord, Limits, PatchEntry, Query, Result, Value,
    Version, VersionedValue,
};
use docfeed_storage::{MemoryStore, OrderedStore};

use crate::clock::VersionClock;
use crate::config::StoreConfig;
use crate::notifier::ChangeNotifier;

/// Patches newer than a poller's version, per key
pub type Changes = Vec<(String, Vec<PatchEntry>)>;

// =============================================================================
// WriteOptions
// =============================================================================

/// Per-write options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Identifier recorded on the resulting patch entry
    pub operation_id: Option<String>,
}

impl WriteOptions {
    /// Options tagging the write with an operation id
    pub fn with_operation_id(id: impl Into<String>) -> Self {
        WriteOptions {
            operation_id: Some(id.into()),
        }
    }
}

// =============================================================================
// DocumentStore
// =============================================================================

/// The authoritative document store
///
/// `DocumentStore` is `Send + Sync`; share it behind an `Arc` across request
/// threads.
pub struct DocumentStore {
    storage: Arc<dyn OrderedStore>,
    config: StoreConfig,
    limits: Limits,
    clock: VersionClock,
    notifier: ChangeNotifier,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// Open a store over `storage` with the default configuration
    pub fn open(storage: Arc<dyn OrderedStore>) -> Result<Self> {
        Self::open_with_config(storage, StoreConfig::default())
    }

    /// Open a store over `storage`.
    ///
    /// Existing records are scanned once so that newly issued epoch majors
    /// exceed every persisted one.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an invalid config, or the storage
    /// error if the initial scan fails.
    pub fn open_with_config(storage: Arc<dyn OrderedStore>, config: StoreConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| docfeed_core::Error::validation(e.to_string()))?;

        let clock = VersionClock::new();
        let mut records = 0usize;
        for (_, bytes) in storage.scan()? {
            let record = DocumentRecord::from_bytes(&bytes)?;
            clock.observe(record.version.major);
            records += 1;
        }
        debug!(records, last_major = clock.last(), "Document store opened");

        Ok(DocumentStore {
            storage,
            config,
            limits: Limits::default(),
            clock,
            notifier: ChangeNotifier::new(),
            write_lock: Mutex::new(()),
        })
    }

    /// A fresh store backed by a [`MemoryStore`]
    pub fn in_memory() -> Self {
        DocumentStore {
            storage: Arc::new(MemoryStore::new()),
            config: StoreConfig::default(),
            limits: Limits::default(),
            clock: VersionClock::new(),
            notifier: ChangeNotifier::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Replace the document limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The store's change notifier
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    // ========== Reads ==========

    /// Raw record for `key`, tombstones included
    pub fn record(&self, key: &str) -> Result<Option<DocumentRecord>> {
        match self.storage.get(key)? {
            Some(bytes) => Ok(Some(DocumentRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Current value of `key`; `None` if absent or deleted
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.record(key)?.and_then(|record| record.value))
    }

    /// Current value and version of `key`.
    ///
    /// The version is [`Version::NONE`] if the key was never written.
    pub fn get_with_version(&self, key: &str) -> Result<VersionedValue> {
        Ok(match self.record(key)? {
            Some(record) => VersionedValue {
                value: record.value,
                version: record.version,
            },
            None => VersionedValue::missing(),
        })
    }

    /// Linear scan over every live document, evaluated against `query`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedOperator` or `Error::InvalidPattern` if the
    /// filter cannot be compiled; nothing is scanned in that case.
    pub fn find(&self, query: &Query) -> Result<Vec<Document>> {
        query.filter.compile()?;
        let mut docs = Vec::new();
        for (key, bytes) in self.storage.scan()? {
            if let Some(value) = DocumentRecord::from_bytes(&bytes)?.value {
                docs.push(Document { key, value });
            }
        }
        let scanned = docs.len();
        let result = query.execute(docs)?;
        trace!(scanned, matched = result.len(), "find");
        Ok(result)
    }

    // ========== Writes ==========

    /// Create `key` if it is absent or deleted.
    ///
    /// Returns `false` without writing if a live value exists.
    pub fn create(&self, key: &str, value: Value) -> Result<bool> {
        self.create_with(key, value, WriteOptions::default())
    }

    /// [`create`](Self::create) with write options
    pub fn create_with(&self, key: &str, value: Value, options: WriteOptions) -> Result<bool> {
        self.validate(key, Some(&value))?;
        let _guard = self.write_lock.lock();
        let record = self.record(key)?;
        if record.as_ref().map_or(false, DocumentRecord::is_live) {
            trace!(key = %key, "create rejected: document exists");
            return Ok(false);
        }
        self.put(key, record, Some(value), options)?;
        Ok(true)
    }

    /// Delete `key`, leaving a tombstone.
    ///
    /// Returns `false` if there is no live value.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.remove_with(key, WriteOptions::default())
    }

    /// [`remove`](Self::remove) with write options
    pub fn remove_with(&self, key: &str, options: WriteOptions) -> Result<bool> {
        self.validate(key, None)?;
        let _guard = self.write_lock.lock();
        let record = self.record(key)?;
        if !record.as_ref().map_or(false, DocumentRecord::is_live) {
            trace!(key = %key, "remove rejected: no live document");
            return Ok(false);
        }
        self.put(key, record, None, options)?;
        Ok(true)
    }

    /// Compare-and-swap: write `value` iff the current version is `expected`.
    ///
    /// Use [`Version::NONE`] to expect a key that was never written. A
    /// mismatch returns `Ok(false)`. A matching write whose value equals the
    /// current one returns `Ok(true)` without advancing the version.
    pub fn set_if_version(&self, key: &str, expected: Version, value: Value) -> Result<bool> {
        self.set_if_version_with(key, expected, value, WriteOptions::default())
    }

    /// [`set_if_version`](Self::set_if_version) with write options
    pub fn set_if_version_with(
        &self,
        key: &str,
        expected: Version,
        value: Value,
        options: WriteOptions,
    ) -> Result<bool> {
        self.validate(key, Some(&value))?;
        let _guard = self.write_lock.lock();
        let record = self.record(key)?;
        let current = record.as_ref().map_or(Version::NONE, |r| r.version);
        if current != expected {
            trace!(key = %key, %current, %expected, "set_if_version rejected: version mismatch");
            return Ok(false);
        }
        self.put(key, record, Some(value), options)?;
        Ok(true)
    }

    fn validate(&self, key: &str, value: Option<&Value>) -> Result<()> {
        self.limits.validate_key(key)?;
        if let Some(value) = value {
            self.limits.validate_value(value)?;
        }
        Ok(())
    }

    /// Shared write path. Caller holds the write lock.
    ///
    /// Returns the committed patch, or `None` if the value was unchanged.
    fn put(
        &self,
        key: &str,
        record: Option<DocumentRecord>,
        value: Option<Value>,
        options: WriteOptions,
    ) -> Result<Option<PatchEntry>> {
        let old_value = record.as_ref().and_then(|r| r.value.as_ref());
        let ops = diff_values(old_value, value.as_ref());
        if ops.is_empty() {
            trace!(key = %key, "no-op write skipped");
            return Ok(None);
        }

        let (version, mut patch_log) = match record {
            Some(DocumentRecord {
                value: Some(_),
                version,
                patch_log,
                ..
            }) => (version.next_minor(), patch_log),
            Some(DocumentRecord {
                value: None,
                version,
                patch_log,
                ..
            }) => (
                Version::first_of_epoch(self.clock.next_major_after(version.major)),
                patch_log,
            ),
            None => (Version::first_of_epoch(self.clock.next_major()), Vec::new()),
        };

        let entry = PatchEntry {
            version,
            ops,
            operation_id: options.operation_id,
        };
        let keep = self.config.patch_log_capacity - 1;
        if patch_log.len() > keep {
            patch_log.drain(..patch_log.len() - keep);
        }
        patch_log.push(entry.clone());

        let record = DocumentRecord {
            value,
            version,
            patch_log,
            updated_at: now_micros(),
        };
        self.storage.put(key, record.to_bytes()?)?;
        debug!(key = %key, version = %version, ops = entry.ops.len(), tombstone = record.is_tombstone(), "patch committed");

        let woken = self.notifier.publish(key, &entry);
        trace!(key = %key, woken, "pollers notified");
        Ok(Some(entry))
    }

    // ========== Change feed ==========

    /// Long-poll for patches newer than the given versions.
    ///
    /// Returns at once with every key that already has newer retained
    /// patches. Otherwise blocks until a matching patch is committed (and
    /// returns just that key and patch) or until the timeout elapses (and
    /// returns an empty list). `timeout` defaults to the configured poll
    /// timeout and is clamped to the configured maximum.
    ///
    /// A poller whose version predates the oldest retained patch receives
    /// the retained suffix only.
    pub fn poll(&self, entries: &[(String, Version)], timeout: Option<Duration>) -> Result<Changes> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let interest: BTreeMap<String, Version> = entries.iter().cloned().collect();
        let subscription = self.notifier.subscribe(interest.clone());

        let mut changes = Vec::new();
        for (key, since) in &interest {
            if let Some(record) = self.record(key)? {
                let patches = record.patches_since(since);
                if !patches.is_empty() {
                    changes.push((key.clone(), patches));
                }
            }
        }
        if !changes.is_empty() {
            trace!(keys = changes.len(), "poll answered from backlog");
            return Ok(changes);
        }

        let timeout = self.config.poll_timeout(timeout);
        match subscription.wait(timeout) {
            Some((key, entry)) => {
                trace!(key = %key, version = %entry.version, "poll woken");
                Ok(vec![(key, vec![entry])])
            }
            None => {
                trace!(timeout_ms = timeout.as_millis() as u64, "poll timed out");
                Ok(Vec::new())
            }
        }
    }
}
