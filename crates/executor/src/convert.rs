//! Conversions between store errors and executor errors.

use crate::Error;

/// Convert a store error to an executor Error, preserving every detail.
impl From<docfeed_core::Error> for Error {
    fn from(err: docfeed_core::Error) -> Self {
        use docfeed_core::Error as CoreError;
        match err {
            CoreError::Validation { reason } => Error::InvalidInput { reason },
            CoreError::UnsupportedOperator { operator } => Error::UnsupportedOperator { operator },
            CoreError::InvalidPattern { pattern, reason } => {
                Error::InvalidPattern { pattern, reason }
            }
            CoreError::Patch { reason } => Error::Patch { reason },
            CoreError::Storage(reason) => Error::Io { reason },
            CoreError::Serialization(reason) => Error::Serialization { reason },
            CoreError::Corruption(reason) => Error::Corruption { reason },
        }
    }
}

/// Convert back to a store error, for callers that work in store terms.
///
/// `InvalidCommand` maps to a validation error and `Internal` to a
/// storage error.
impl From<Error> for docfeed_core::Error {
    fn from(err: Error) -> Self {
        use docfeed_core::Error as CoreError;
        match err {
            Error::InvalidInput { reason } => CoreError::Validation { reason },
            Error::InvalidCommand { reason } => CoreError::Validation { reason },
            Error::UnsupportedOperator { operator } => CoreError::UnsupportedOperator { operator },
            Error::InvalidPattern { pattern, reason } => {
                CoreError::InvalidPattern { pattern, reason }
            }
            Error::Patch { reason } => CoreError::Patch { reason },
            Error::Io { reason } => CoreError::Storage(reason),
            Error::Serialization { reason } => CoreError::Serialization(reason),
            Error::Corruption { reason } => CoreError::Corruption(reason),
            Error::Internal { reason } => CoreError::Storage(reason),
        }
    }
}
