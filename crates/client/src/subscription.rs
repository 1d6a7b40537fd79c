//! Subscription multiplexer: many per-key watchers, one poll loop
//!
//! ## Interest set
//!
//! The hub keeps one [`InterestSet`] (`key -> last-known version`) for the
//! whole process. A background thread (`docfeed-poll`) waits until the set is
//! non-empty, issues exactly one `poll` with the whole set, applies the
//! returned patches to its cached per-key state, and repeats. Polls never
//! overlap.
//!
//! ## Per-key channels
//!
//! The first subscriber to a key fetches its current value and version once
//! and registers the key. Later subscribers share that channel and are
//! immediately sent the latest snapshot. When the last subscriber drops, the
//! key is deregistered and its cached state discarded; subscribing again
//! starts over with a fresh fetch.
//!
//! A key added while a poll is in flight is included from the next poll on.
//!
//! ## Delivery
//!
//! Each subscriber has a single latest-only slot. A snapshot that has not
//! been read when the next one arrives is replaced, so a slow reader never
//! accumulates a backlog and always reads the newest state.
//!
//! ## Shutdown
//!
//! [`SubscriptionHub::shutdown`] closes every subscription and waits for the
//! poll thread. Dropping the hub closes the subscriptions without waiting; the
//! detached thread exits once its in-flight poll returns.
//!
//! ## Gaps
//!
//! The store returns whatever suffix of a key's patch log it still retains.
//! If the first new patch does not directly follow the cached version, or a
//! patch fails to apply, the key is resynchronized by fetching its current
//! value instead.

use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use docfeed_core::{apply_patch, PatchEntry, Value, Version};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::transport::StoreApi;

// =============================================================================
// DocumentSnapshot
// =============================================================================

/// State of one document as seen by a subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Document key
    pub key: String,
    /// Current value; `None` if missing or deleted
    pub value: Option<Value>,
    /// Version the value was read or reconstructed at
    pub version: Version,
}

// =============================================================================
// InterestSet
// =============================================================================

/// Keys being watched and the last version seen for each
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestSet {
    entries: BTreeMap<String, Version>,
}

impl InterestSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching `key` from `version`
    pub fn register(&mut self, key: impl Into<String>, version: Version) {
        self.entries.insert(key.into(), version);
    }

    /// Stop watching `key`
    pub fn deregister(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Record progress on `key`.
    ///
    /// Ignored if `key` is not registered, so a late poll result cannot
    /// resurrect a key that was dropped meanwhile.
    pub fn advance(&mut self, key: &str, version: Version) -> bool {
        match self.entries.get_mut(key) {
            Some(known) => {
                *known = version;
                true
            }
            None => false,
        }
    }

    /// Last version recorded for `key`
    pub fn get(&self, key: &str) -> Option<Version> {
        self.entries.get(key).copied()
    }

    /// True if `key` is registered
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Poll request for the whole set
    pub fn to_entries(&self) -> Vec<(String, Version)> {
        self.entries
            .iter()
            .map(|(key, version)| (key.clone(), *version))
            .collect()
    }
}

// =============================================================================
// Hub internals
// =============================================================================

#[derive(Default)]
struct MailboxState {
    pending: Option<DocumentSnapshot>,
    closed: bool,
}

/// Latest-only delivery slot for one subscriber
///
/// A new snapshot overwrites one that has not been read yet, so a slow
/// reader holds at most one snapshot and always sees the newest state.
#[derive(Default)]
struct Mailbox {
    state: Mutex<MailboxState>,
    ready: Condvar,
}

impl Mailbox {
    fn holding(snapshot: DocumentSnapshot) -> Self {
        Mailbox {
            state: Mutex::new(MailboxState {
                pending: Some(snapshot),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn deliver(&self, snapshot: DocumentSnapshot) {
        let mut state = self.state.lock();
        if !state.closed {
            state.pending = Some(snapshot);
            self.ready.notify_all();
        }
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    /// Take the pending snapshot, waiting until `deadline` (`None`: forever).
    ///
    /// A snapshot delivered before the mailbox closed is still handed out.
    fn take_until(&self, deadline: Option<Instant>) -> Result<Option<DocumentSnapshot>> {
        let mut state = self.state.lock();
        let mut expired = false;
        loop {
            if let Some(snapshot) = state.pending.take() {
                return Ok(Some(snapshot));
            }
            if state.closed {
                return Err(ClientError::Closed);
            }
            if expired {
                return Ok(None);
            }
            match deadline {
                Some(deadline) => expired = self.ready.wait_until(&mut state, deadline).timed_out(),
                None => self.ready.wait(&mut state),
            }
        }
    }
}

struct KeyChannel {
    latest: DocumentSnapshot,
    subscribers: HashMap<u64, Arc<Mailbox>>,
}

impl KeyChannel {
    fn broadcast(&self) {
        for mailbox in self.subscribers.values() {
            mailbox.deliver(self.latest.clone());
        }
    }
}

#[derive(Default)]
struct HubState {
    interest: InterestSet,
    channels: HashMap<String, KeyChannel>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<HubState>,
    wake: Condvar,
    next_subscriber: AtomicU64,
    polls: AtomicU64,
}

impl Shared {
    fn unsubscribe(&self, key: &str, id: u64) {
        let mut state = self.state.lock();
        let now_empty = match state.channels.get_mut(key) {
            Some(channel) => {
                channel.subscribers.remove(&id);
                channel.subscribers.is_empty()
            }
            None => false,
        };
        if now_empty {
            state.channels.remove(key);
            state.interest.deregister(key);
            debug!(key = %key, "last subscriber left, key deregistered");
        }
    }

    /// Add a subscriber to an open channel, seeded with its latest snapshot
    fn join(&self, state: &mut HubState, key: &str) -> Option<(u64, Arc<Mailbox>)> {
        let channel = state.channels.get_mut(key)?;
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let mailbox = Arc::new(Mailbox::holding(channel.latest.clone()));
        channel.subscribers.insert(id, Arc::clone(&mailbox));
        trace!(key = %key, subscribers = channel.subscribers.len(), "joined existing channel");
        Some((id, mailbox))
    }
}

/// Result of replaying a batch of patches onto cached state
enum Replay {
    Applied(DocumentSnapshot),
    Unchanged,
    Resync,
}

fn replay(latest: &DocumentSnapshot, patches: &[PatchEntry]) -> Replay {
    let mut value = latest.value.clone();
    let mut version = latest.version;
    let mut applied = false;

    for patch in patches {
        if patch.version <= version {
            continue;
        }
        if !version.is_followed_by(&patch.version) {
            warn!(key = %latest.key, cached = %version, received = %patch.version, "patch gap detected");
            return Replay::Resync;
        }
        match apply_patch(value, &patch.ops) {
            Ok(next) => {
                value = next;
                version = patch.version;
                applied = true;
            }
            Err(e) => {
                warn!(key = %latest.key, version = %patch.version, error = %e, "patch failed to apply");
                return Replay::Resync;
            }
        }
    }

    if applied {
        Replay::Applied(DocumentSnapshot {
            key: latest.key.clone(),
            value,
            version,
        })
    } else {
        Replay::Unchanged
    }
}

// =============================================================================
// SubscriptionHub
// =============================================================================

/// Fans per-key subscriptions into a single background poll loop
pub struct SubscriptionHub {
    shared: Arc<Shared>,
    api: Arc<dyn StoreApi>,
    setup: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionHub {
    /// Start the hub and its poll thread.
    ///
    /// The thread is named `docfeed-poll`.
    pub fn start(api: Arc<dyn StoreApi>, config: &ClientConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(HubState::default()),
            wake: Condvar::new(),
            next_subscriber: AtomicU64::new(0),
            polls: AtomicU64::new(0),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            let api = Arc::clone(&api);
            let poll_timeout = config.poll_timeout();
            let error_backoff = config.poll_error_backoff();
            thread::Builder::new()
                .name("docfeed-poll".to_string())
                .spawn(move || poll_loop(&shared, api.as_ref(), poll_timeout, error_backoff))
                .map_err(|e| ClientError::Transport(format!("failed to spawn poll thread: {}", e)))?
        };
        info!(poll_timeout_ms = config.poll_timeout_ms, "subscription hub started");

        Ok(SubscriptionHub {
            shared,
            api,
            setup: Mutex::new(HashMap::new()),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Watch `key`.
    ///
    /// The returned subscription immediately holds the latest known snapshot
    /// and then receives the newest snapshot after each change.
    pub fn subscribe(&self, key: &str) -> Result<Subscription> {
        if let Some(subscription) = self.join_existing(key)? {
            return Ok(subscription);
        }

        // First subscriber. Concurrent first subscribers to the same key
        // queue on its setup lock so the key is fetched once; other keys
        // are not held up.
        let setup = Arc::clone(self.setup.lock().entry(key.to_string()).or_default());
        let result = {
            let _guard = setup.lock();
            self.open_channel(key)
        };
        let mut pending = self.setup.lock();
        if pending.get(key).map_or(false, |lock| Arc::ptr_eq(lock, &setup)) {
            pending.remove(key);
        }
        result
    }

    fn join_existing(&self, key: &str) -> Result<Option<Subscription>> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(ClientError::Closed);
        }
        Ok(self
            .shared
            .join(&mut state, key)
            .map(|(id, mailbox)| self.handle(key, id, mailbox)))
    }

    fn open_channel(&self, key: &str) -> Result<Subscription> {
        if let Some(subscription) = self.join_existing(key)? {
            return Ok(subscription);
        }

        // Fetch outside the state lock so the poll thread keeps running
        let current = self.api.get_with_version(key)?;
        let latest = DocumentSnapshot {
            key: key.to_string(),
            value: current.value,
            version: current.version,
        };

        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(ClientError::Closed);
        }
        // Another first subscriber may have opened the channel after a
        // failed fetch released the setup lock
        if let Some((id, mailbox)) = self.shared.join(&mut state, key) {
            return Ok(self.handle(key, id, mailbox));
        }

        let id = self.shared.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let mailbox = Arc::new(Mailbox::holding(latest.clone()));
        let mut subscribers = HashMap::new();
        subscribers.insert(id, Arc::clone(&mailbox));
        state.interest.register(key, latest.version);
        state
            .channels
            .insert(key.to_string(), KeyChannel { latest, subscribers });
        self.shared.wake.notify_all();
        debug!(key = %key, version = %current.version, "key registered");
        Ok(self.handle(key, id, mailbox))
    }

    fn handle(&self, key: &str, id: u64, mailbox: Arc<Mailbox>) -> Subscription {
        Subscription {
            key: key.to_string(),
            id,
            mailbox,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Snapshot of the interest set
    pub fn interest(&self) -> InterestSet {
        self.shared.state.lock().interest.clone()
    }

    /// Live subscribers for `key`
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.shared
            .state
            .lock()
            .channels
            .get(key)
            .map_or(0, |channel| channel.subscribers.len())
    }

    /// Number of polls issued so far
    pub fn poll_count(&self) -> u64 {
        self.shared.polls.load(Ordering::SeqCst)
    }

    /// Close every subscription and tell the poll thread to stop.
    ///
    /// Returns at once; the thread exits when its in-flight poll returns.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        for channel in state.channels.values() {
            for mailbox in channel.subscribers.values() {
                mailbox.close();
            }
        }
        state.channels.clear();
        state.interest = InterestSet::new();
        self.shared.wake.notify_all();
        debug!("subscription hub closed");
    }

    /// Stop the poll thread and close every subscription.
    ///
    /// Blocks until an in-flight poll returns.
    pub fn shutdown(&self) {
        self.close();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("poll thread panicked");
            }
            info!("subscription hub stopped");
        }
    }
}

impl Drop for SubscriptionHub {
    fn drop(&mut self) {
        // The poll thread is detached rather than joined
        self.close();
        if self.worker.lock().take().is_some() {
            trace!("poll thread detached");
        }
    }
}

fn poll_loop(shared: &Shared, api: &dyn StoreApi, timeout: Duration, error_backoff: Duration) {
    loop {
        let entries = {
            let mut state = shared.state.lock();
            while !state.shutdown && state.interest.is_empty() {
                shared.wake.wait(&mut state);
            }
            if state.shutdown {
                return;
            }
            state.interest.to_entries()
        };

        shared.polls.fetch_add(1, Ordering::SeqCst);
        trace!(keys = entries.len(), "polling");
        match api.poll(&entries, Some(timeout)) {
            Ok(changes) => {
                for (key, patches) in changes {
                    deliver(shared, api, &key, &patches);
                }
            }
            Err(e) => {
                warn!(error = %e, backoff_ms = error_backoff.as_millis() as u64, "poll failed");
                let mut state = shared.state.lock();
                if !state.shutdown {
                    let _ = shared.wake.wait_for(&mut state, error_backoff);
                }
            }
        }
    }
}

fn deliver(shared: &Shared, api: &dyn StoreApi, key: &str, patches: &[PatchEntry]) {
    {
        let mut state = shared.state.lock();
        let outcome = match state.channels.get(key) {
            Some(channel) => replay(&channel.latest, patches),
            None => return,
        };
        match outcome {
            Replay::Unchanged => return,
            Replay::Applied(snapshot) => {
                let version = snapshot.version;
                publish(&mut state, snapshot);
                trace!(key = %key, version = %version, "patches applied");
                return;
            }
            Replay::Resync => {}
        }
    }
    resync(shared, api, key);
}

fn resync(shared: &Shared, api: &dyn StoreApi, key: &str) {
    match api.get_with_version(key) {
        Ok(current) => {
            let mut state = shared.state.lock();
            let stale = state
                .channels
                .get(key)
                .map_or(false, |channel| current.version > channel.latest.version);
            if stale {
                info!(key = %key, version = %current.version, "resynchronized after gap");
                publish(
                    &mut state,
                    DocumentSnapshot {
                        key: key.to_string(),
                        value: current.value,
                        version: current.version,
                    },
                );
            }
        }
        Err(e) => warn!(key = %key, error = %e, "resync fetch failed"),
    }
}

fn publish(state: &mut HubState, snapshot: DocumentSnapshot) {
    let key = snapshot.key.clone();
    let version = snapshot.version;
    if let Some(channel) = state.channels.get_mut(&key) {
        channel.latest = snapshot;
        channel.broadcast();
        state.interest.advance(&key, version);
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// One subscriber's handle on a key; unsubscribes on drop
///
/// Snapshots are not queued: if several changes land between reads, the
/// next read returns only the newest one.
pub struct Subscription {
    key: String,
    id: u64,
    mailbox: Arc<Mailbox>,
    shared: Arc<Shared>,
}

impl Subscription {
    /// Watched key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Block for the next snapshot
    pub fn recv(&self) -> Result<DocumentSnapshot> {
        self.mailbox.take_until(None)?.ok_or(ClientError::Closed)
    }

    /// Block for the next snapshot, up to `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<DocumentSnapshot>> {
        self.mailbox.take_until(Instant::now().checked_add(timeout))
    }

    /// Next snapshot if one is pending
    pub fn try_recv(&self) -> Result<Option<DocumentSnapshot>> {
        self.mailbox.take_until(Some(Instant::now()))
    }

    /// Latest state of the key, without consuming the pending snapshot
    pub fn latest(&self) -> Option<DocumentSnapshot> {
        self.shared
            .state
            .lock()
            .channels
            .get(&self.key)
            .map(|channel| channel.latest.clone())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.unsubscribe(&self.key, self.id);
    }
}
