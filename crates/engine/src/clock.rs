//! Version clock: source of epoch `major` numbers
//!
//! Majors come from a microsecond wall clock, forced strictly monotonic within
//! the process. A store opened over existing records first observes the
//! largest persisted major so that a clock step backwards cannot reissue one.

use std::sync::atomic::{AtomicU64, Ordering};

use docfeed_core::now_micros;

/// Monotonic high-resolution counter for epoch majors
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    /// Create a clock that has issued nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a major strictly greater than every major issued or observed so far
    pub fn next_major(&self) -> u64 {
        self.next_major_after(0)
    }

    /// Issue a major strictly greater than `floor` and than anything issued
    /// or observed so far
    pub fn next_major_after(&self, floor: u64) -> u64 {
        let mut issued = 0;
        // fetch_update only fails when the closure returns None
        let _ = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                issued = now_micros().max(last + 1).max(floor + 1);
                Some(issued)
            });
        issued
    }

    /// Record a major seen in persisted state
    pub fn observe(&self, major: u64) {
        self.last.fetch_max(major, Ordering::SeqCst);
    }

    /// Last major issued or observed
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}
