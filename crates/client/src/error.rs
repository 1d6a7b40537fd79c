//! Client error types
//!
//! Store-side failures arrive as the executor's wire [`Error`](docfeed_executor::Error)
//! and are wrapped unchanged. A failed compare-and-swap is never an error;
//! the optimistic update loop retries it.

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the docfeed client
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// The store rejected or failed the request
    #[error("store error: {0}")]
    Store(#[from] docfeed_executor::Error),

    /// The request or reply could not be carried
    #[error("transport error: {0}")]
    Transport(String),

    /// An optimistic update hit its configured attempt cap
    #[error("gave up updating '{key}' after {attempts} attempts")]
    RetriesExhausted {
        /// Document key
        key: String,
        /// Attempts made
        attempts: u32,
    },

    /// The subscription hub has shut down
    #[error("subscription hub closed")]
    Closed,

    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    /// True if the request was rejected for its content and must not be retried
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Store(e) if e.is_validation())
    }
}

impl From<docfeed_core::Error> for ClientError {
    fn from(err: docfeed_core::Error) -> Self {
        ClientError::Store(err.into())
    }
}

impl From<docfeed_core::LimitError> for ClientError {
    fn from(err: docfeed_core::LimitError) -> Self {
        docfeed_core::Error::from(err).into()
    }
}
