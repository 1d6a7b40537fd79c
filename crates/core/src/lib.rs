//! Core types for docfeed
//!
//! This crate defines the foundational types used throughout the system:
//! - Version: `(major, minor)` document version with epoch semantics
//! - DocumentRecord / PatchEntry: persisted per-key state and its patch log
//! - Patch: structural diff and patch of whole JSON documents
//! - Filter / Query: predicate and sort evaluation for `find`
//! - Limits: validation applied to keys and values before any I/O
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filter;
pub mod limits;
pub mod patch;
pub mod query;
pub mod record;
pub mod value;
pub mod version;

pub use error::{Error, Result};
pub use filter::{CompiledFilter, DocumentView, FieldPath, FieldRef, Filter};
pub use limits::{LimitError, Limits};
pub use patch::{apply as apply_patch, diff as diff_values, PatchOp};
pub use query::{Direction, OrderBy, Query};
pub use record::{now_micros, Document, DocumentRecord, PatchEntry, VersionedValue};
pub use value::json_equal;
pub use version::Version;

/// JSON value type used for every document
pub use serde_json::Value;
