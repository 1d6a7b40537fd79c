//! # docfeed Executor
//!
//! The wire contract of the docfeed document store.
//!
//! - [`Command`]/[`Output`] - serializable request and result types
//! - [`Executor`] - dispatches commands to a shared `DocumentStore`
//! - [`Executor::execute_json`] - the JSON-in/JSON-out boundary transports call
//!
//! ## Quick Start
//!
//! ```text
//! use docfeed_executor::{Command, Executor, Output};
//!
//! let executor = Executor::new(store);
//! let out = executor.execute(Command::Get { key: "user:1".into() })?;
//! ```

#![warn(missing_docs)]

mod command;
mod convert;
mod error;
mod executor;
mod output;

// Test modules
#[cfg(test)]
mod tests;

// =============================================================================
// Public API
// =============================================================================

pub use command::Command;
pub use error::Error;
pub use executor::Executor;
pub use output::{Output, Response};

// Re-export store types used in commands so callers don't need docfeed-core
pub use docfeed_core::{Document, PatchEntry, Query, Value, Version, VersionedValue};

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, Error>;
