//! Error types for docfeed
//!
//! This module defines all error types raised by the document store core.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Two conditions are deliberately *not* errors:
//! - a compare-and-swap whose expected version does not match (reported as `false`)
//! - a read of a missing or deleted key (reported as `None`)

use thiserror::Error;

/// Result type alias for docfeed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Value or key rejected before any storage I/O
    #[error("validation error: {reason}")]
    Validation {
        /// Why the input was rejected
        reason: String,
    },

    /// Filter uses an operator the evaluator does not know
    #[error("unsupported filter operator: {operator}")]
    UnsupportedOperator {
        /// The operator name as received
        operator: String,
    },

    /// A `matches` filter carries a pattern that does not compile
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// A structural patch could not be applied to the base value
    #[error("patch error: {reason}")]
    Patch {
        /// What went wrong
        reason: String,
    },

    /// Underlying ordered store failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Persisted record is unreadable
    #[error("data corruption: {0}")]
    Corruption(String),
}

impl Error {
    /// Build a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }

    /// Build a patch error
    pub fn patch(reason: impl Into<String>) -> Self {
        Error::Patch {
            reason: reason.into(),
        }
    }

    /// True for errors raised before any I/O because the input was bad
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
