//! Document version identifiers
//!
//! Every accepted mutation produces a version. A version is a `(major, minor)`
//! pair:
//!
//! - **major** identifies an epoch: the lifetime of a key between its creation
//!   and its next deletion. It is drawn from a monotonic clock when the epoch
//!   starts and stays fixed until the epoch ends.
//! - **minor** counts accepted mutations within the epoch, starting at 1.
//!
//! ## Comparison
//!
//! Versions are ordered lexicographically: first by `major`, then by `minor`.
//! The sentinel [`Version::NONE`] (`{0, 0}`) sorts before every real version
//! and stands for "this key never existed".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of a document
///
/// ## Invariants
///
/// - `minor` increases by exactly 1 per accepted mutation within an epoch
/// - `major` strictly increases across epochs of the same key
/// - field order makes the derived `Ord` lexicographic
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Version {
    /// Epoch identifier
    pub major: u64,
    /// Mutation counter within the epoch
    pub minor: u64,
}

impl Version {
    /// Sentinel for a key that has never been written
    pub const NONE: Version = Version { major: 0, minor: 0 };

    /// Create a version from its parts
    pub const fn new(major: u64, minor: u64) -> Self {
        Version { major, minor }
    }

    /// First version of a fresh epoch
    pub const fn first_of_epoch(major: u64) -> Self {
        Version { major, minor: 1 }
    }

    /// Next version within the same epoch
    pub const fn next_minor(&self) -> Self {
        Version {
            major: self.major,
            minor: self.minor + 1,
        }
    }

    /// True for the "never existed" sentinel
    #[inline]
    pub const fn is_none(&self) -> bool {
        self.major == 0 && self.minor == 0
    }

    /// True when `next` can directly follow `self` in a key's history
    ///
    /// That is either the next minor of the same epoch, or the first minor
    /// of a later epoch.
    pub fn is_followed_by(&self, next: &Version) -> bool {
        *next == self.next_minor() || (next.minor == 1 && next.major > self.major)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ============================================================================
// Tests
// ============================================================================
