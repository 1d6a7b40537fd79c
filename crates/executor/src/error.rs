//! Error types for command execution.
//!
//! All errors from command execution are represented by the [`Error`] enum.
//! These errors are:
//! - **Structured**: Each variant has typed fields for error details
//! - **Serializable**: Can be converted to/from JSON
//! - **Lossless**: No error information is lost in conversion from store errors
//!
//! A failed compare-and-swap and a missing key are results, not errors, and
//! never appear here.

use serde::{Deserialize, Serialize};

/// Command execution errors.
///
/// # Categories
///
/// | Category | Variants | Description |
/// |----------|----------|-------------|
/// | Validation | `InvalidInput`, `InvalidCommand` | Bad input, rejected before I/O |
/// | Query | `UnsupportedOperator`, `InvalidPattern` | Filter cannot be evaluated |
/// | Patch | `Patch` | Structural patch does not apply |
/// | System | `Io`, `Serialization`, `Corruption`, `Internal` | Infrastructure errors |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    // ==================== Validation Errors ====================
    /// Key or value rejected
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Request is not a well-formed command
    #[error("invalid command: {reason}")]
    InvalidCommand { reason: String },

    // ==================== Query Errors ====================
    /// Filter operator not recognized
    #[error("unsupported filter operator: {operator}")]
    UnsupportedOperator { operator: String },

    /// `matches` pattern does not compile
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // ==================== Patch Errors ====================
    /// Patch could not be applied
    #[error("patch error: {reason}")]
    Patch { reason: String },

    // ==================== System Errors ====================
    /// Underlying storage failed
    #[error("I/O error: {reason}")]
    Io { reason: String },

    /// Serialization error
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// Persisted data is unreadable
    #[error("data corruption: {reason}")]
    Corruption { reason: String },

    /// Internal error
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl Error {
    /// True for errors caused by the caller's input; retrying cannot help
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput { .. }
                | Error::InvalidCommand { .. }
                | Error::UnsupportedOperator { .. }
                | Error::InvalidPattern { .. }
        )
    }
}
