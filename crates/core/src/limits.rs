//! Size limits for documents and keys
//!
//! Every value written to the store passes through [`Limits::validate_value`]
//! and every key through [`Limits::validate_key`] before any storage I/O.
//! Violations surface as [`Error::Validation`](crate::Error::Validation).
//!
//! | Limit | Default |
//! |-------|---------|
//! | Max key length | 1024 bytes |
//! | Max document size | 16 MB |
//! | Max nesting depth | 100 levels |
//! | Max array size | 1M elements |

use serde_json::Value;
use thiserror::Error;

use crate::error::Error;

/// Maximum serialized document size in bytes (16 MB)
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Maximum nesting depth in a document (100 levels)
pub const MAX_NESTING_DEPTH: usize = 100;

/// Maximum array size in elements (1 million elements)
pub const MAX_ARRAY_SIZE: usize = 1_000_000;

/// Maximum key length in bytes
pub const MAX_KEY_BYTES: usize = 1024;

/// Error type for limit violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    /// Key is empty
    #[error("key must not be empty")]
    EmptyKey,

    /// Key exceeds maximum length
    #[error("key length {length} exceeds maximum of {max} bytes")]
    KeyTooLong {
        /// Actual key length
        length: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Document exceeds maximum size
    #[error("document size {size} exceeds maximum of {max} bytes")]
    DocumentTooLarge {
        /// Actual document size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Document nesting exceeds maximum depth
    #[error("document nesting depth {depth} exceeds maximum of {max} levels")]
    NestingTooDeep {
        /// Actual nesting depth
        depth: usize,
        /// Maximum allowed depth
        max: usize,
    },

    /// Array exceeds maximum size
    #[error("array size {size} exceeds maximum of {max} elements")]
    ArrayTooLarge {
        /// Actual array size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },
}

impl From<LimitError> for Error {
    fn from(e: LimitError) -> Self {
        Error::validation(e.to_string())
    }
}

/// Limits enforced on incoming keys and values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum key length in bytes
    pub max_key_bytes: usize,
    /// Maximum serialized document size in bytes
    pub max_document_bytes: usize,
    /// Maximum nesting depth
    pub max_nesting_depth: usize,
    /// Maximum array length
    pub max_array_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_key_bytes: MAX_KEY_BYTES,
            max_document_bytes: MAX_DOCUMENT_SIZE,
            max_nesting_depth: MAX_NESTING_DEPTH,
            max_array_len: MAX_ARRAY_SIZE,
        }
    }
}

impl Limits {
    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        Limits {
            max_key_bytes: 16,
            max_document_bytes: 256,
            max_nesting_depth: 4,
            max_array_len: 8,
        }
    }

    /// Validate a document key
    pub fn validate_key(&self, key: &str) -> Result<(), LimitError> {
        if key.is_empty() {
            return Err(LimitError::EmptyKey);
        }
        if key.len() > self.max_key_bytes {
            return Err(LimitError::KeyTooLong {
                length: key.len(),
                max: self.max_key_bytes,
            });
        }
        Ok(())
    }

    /// Validate a document value
    ///
    /// Depth and array size are checked first so that a pathological value
    /// is rejected before it is serialized for the size check.
    pub fn validate_value(&self, value: &Value) -> Result<(), LimitError> {
        let depth = nesting_depth(value);
        if depth > self.max_nesting_depth {
            return Err(LimitError::NestingTooDeep {
                depth,
                max: self.max_nesting_depth,
            });
        }

        let array = max_array_size(value);
        if array > self.max_array_len {
            return Err(LimitError::ArrayTooLarge {
                size: array,
                max: self.max_array_len,
            });
        }

        let size = serialized_size(value);
        if size > self.max_document_bytes {
            return Err(LimitError::DocumentTooLarge {
                size,
                max: self.max_document_bytes,
            });
        }
        Ok(())
    }
}

/// Nesting depth of a value; 0 for scalars
pub fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => 0,
        Value::Array(arr) => 1 + arr.iter().map(nesting_depth).max().unwrap_or(0),
        Value::Object(obj) => 1 + obj.values().map(nesting_depth).max().unwrap_or(0),
    }
}

/// Largest array length anywhere in the value
pub fn max_array_size(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => 0,
        Value::Array(arr) => {
            let nested = arr.iter().map(max_array_size).max().unwrap_or(0);
            arr.len().max(nested)
        }
        Value::Object(obj) => obj.values().map(max_array_size).max().unwrap_or(0),
    }
}

fn serialized_size(value: &Value) -> usize {
    // Display for Value cannot fail
    value.to_string().len()
}
