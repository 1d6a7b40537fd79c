//! Command enum defining all docfeed store operations.
//!
//! Commands are the wire-level "instruction set" of the store. Every
//! operation a client can perform is a variant of this enum.
//!
//! Commands are:
//! - **Self-contained**: All parameters needed for execution are in the variant
//! - **Serializable**: Can be converted to/from JSON for any transport
//! - **Pure data**: No closures or executable code

use serde::{Deserialize, Serialize};

use docfeed_core::{Query, Value, Version};

/// A command is a self-contained, serializable operation.
///
/// # Wire format
///
/// Externally tagged: `"Ping"`, `{"Get": {"key": "user:1"}}`,
/// `{"Poll": {"entries": [["user:1", {"major": 5, "minor": 2}]]}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum Command {
    /// Liveness check.
    /// Returns: `Output::Pong`
    Ping,

    /// Read a document.
    /// Returns: `Output::Maybe`
    Get { key: String },

    /// Read a document with its version.
    /// Returns: `Output::VersionedValue`
    GetWithVersion { key: String },

    /// Create a document if absent or deleted.
    /// Returns: `Output::Bool`
    Create {
        key: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation_id: Option<String>,
    },

    /// Delete a live document.
    /// Returns: `Output::Bool`
    Remove {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation_id: Option<String>,
    },

    /// Compare-and-swap write.
    /// Returns: `Output::Bool`
    SetIfVersion {
        key: String,
        version: Version,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation_id: Option<String>,
    },

    /// Query live documents.
    /// Returns: `Output::Documents`
    Find { query: Query },

    /// Long-poll for patches newer than the given versions.
    /// Returns: `Output::Changes`
    Poll {
        entries: Vec<(String, Version)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

impl Command {
    /// Variant name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "Ping",
            Command::Get { .. } => "Get",
            Command::GetWithVersion { .. } => "GetWithVersion",
            Command::Create { .. } => "Create",
            Command::Remove { .. } => "Remove",
            Command::SetIfVersion { .. } => "SetIfVersion",
            Command::Find { .. } => "Find",
            Command::Poll { .. } => "Poll",
        }
    }
}
