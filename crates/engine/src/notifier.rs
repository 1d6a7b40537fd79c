//! Change notifier: wakes blocked polls when a patch is committed
//!
//! A poll registers its interest (`key -> last-known version`) *before* it
//! scans current state, so a patch committed between the scan and the wait is
//! captured by the registration rather than lost. Each registration holds at
//! most one delivered patch: the first matching commit wins and later ones are
//! left for the next poll's scan.
//!
//! Registrations are removed when their [`PatchSubscription`] guard drops,
//! whichever way the poll exits.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

use docfeed_core::{PatchEntry, Version};

/// One key's committed patch
pub type KeyedPatch = (String, PatchEntry);

struct Slot {
    interest: HashMap<String, Version>,
    delivered: Mutex<Option<KeyedPatch>>,
    ready: Condvar,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    slots: HashMap<u64, Arc<Slot>>,
}

/// In-process publish/subscribe channel for committed patches
#[derive(Default)]
pub struct ChangeNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl ChangeNotifier {
    /// Create a notifier with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in patches newer than the given versions.
    ///
    /// The registration is live as soon as this returns.
    pub fn subscribe<I>(&self, interest: I) -> PatchSubscription
    where
        I: IntoIterator<Item = (String, Version)>,
    {
        let slot = Arc::new(Slot {
            interest: interest.into_iter().collect(),
            delivered: Mutex::new(None),
            ready: Condvar::new(),
        });

        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.slots.insert(id, Arc::clone(&slot));
        trace!(subscription_id = id, keys = slot.interest.len(), "Poll subscribed");

        PatchSubscription {
            id,
            slot,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Deliver a committed patch to every registration interested in it.
    ///
    /// Returns the number of registrations woken.
    pub fn publish(&self, key: &str, entry: &PatchEntry) -> usize {
        let registry = self.registry.lock();
        let mut woken = 0;
        for slot in registry.slots.values() {
            let interested = slot
                .interest
                .get(key)
                .map_or(false, |known| entry.version > *known);
            if !interested {
                continue;
            }
            let mut delivered = slot.delivered.lock();
            if delivered.is_none() {
                *delivered = Some((key.to_string(), entry.clone()));
                slot.ready.notify_one();
                woken += 1;
            }
        }
        woken
    }

    /// Number of live registrations
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().slots.len()
    }
}

/// A live poll registration; unregisters on drop
pub struct PatchSubscription {
    id: u64,
    slot: Arc<Slot>,
    registry: Arc<Mutex<Registry>>,
}

impl PatchSubscription {
    /// Block until a matching patch is delivered or `timeout` elapses
    ///
    /// A timeout too large to express as a deadline waits without one.
    pub fn wait(&self, timeout: Duration) -> Option<KeyedPatch> {
        let deadline = Instant::now().checked_add(timeout);
        let mut delivered = self.slot.delivered.lock();
        while delivered.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.slot.ready.wait_until(&mut delivered, deadline).timed_out() {
                        break;
                    }
                }
                None => self.slot.ready.wait(&mut delivered),
            }
        }
        delivered.take()
    }

    /// Take a delivered patch without blocking
    pub fn try_take(&self) -> Option<KeyedPatch> {
        self.slot.delivered.lock().take()
    }
}

impl Drop for PatchSubscription {
    fn drop(&mut self) {
        self.registry.lock().slots.remove(&self.id);
        trace!(subscription_id = self.id, "Poll unsubscribed");
    }
}
