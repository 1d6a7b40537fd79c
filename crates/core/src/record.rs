//! Persisted document records and the patches they retain
//!
//! One [`DocumentRecord`] is stored per key. A record whose `value` is absent
//! is a tombstone: the key was deleted but its patch history is kept so that
//! watchers can still observe the deletion.
//!
//! Records are persisted as JSON: `{value?, version, patchLog, updatedAt}`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::patch::PatchOp;
use crate::version::Version;

/// One entry of a document's patch log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchEntry {
    /// Version this patch produced
    pub version: Version,
    /// Structural diff from the previous whole value
    pub ops: Vec<PatchOp>,
    /// Caller-supplied identifier of the operation that produced the patch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

impl PatchEntry {
    /// Create a patch entry without an operation id
    pub fn new(version: Version, ops: Vec<PatchOp>) -> Self {
        PatchEntry {
            version,
            ops,
            operation_id: None,
        }
    }
}

/// Stored state of a single key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Current value; `None` marks a tombstone
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    /// Version of the latest accepted mutation
    pub version: Version,
    /// Most recent patches, oldest first
    #[serde(default)]
    pub patch_log: Vec<PatchEntry>,
    /// Last modification time (microseconds since epoch)
    pub updated_at: u64,
}

impl DocumentRecord {
    /// True if the record holds a live value
    pub fn is_live(&self) -> bool {
        self.value.is_some()
    }

    /// True if the record is a tombstone
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Retained patches strictly newer than `since`, oldest first
    pub fn patches_since(&self, since: &Version) -> Vec<PatchEntry> {
        self.patch_log
            .iter()
            .filter(|entry| entry.version > *since)
            .cloned()
            .collect()
    }

    /// Oldest retained version, if any patch is retained
    pub fn oldest_retained(&self) -> Option<Version> {
        self.patch_log.first().map(|entry| entry.version)
    }

    /// Serialize for the ordered store
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record read from the ordered store
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Corruption(e.to_string()))
    }
}

/// A live document as returned by reads and queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document key
    pub key: String,
    /// Current value
    pub value: Value,
}

impl Document {
    /// Create a document
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Document {
            key: key.into(),
            value,
        }
    }
}

/// A value together with the version it was read at
///
/// `value` is `None` for missing and deleted keys; `version` is
/// [`Version::NONE`] only for keys that were never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedValue {
    /// Current value, if live
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    /// Current version
    pub version: Version,
}

impl VersionedValue {
    /// The reading for a key that was never written
    pub fn missing() -> Self {
        VersionedValue {
            value: None,
            version: Version::NONE,
        }
    }
}

/// Deserialize an optional value that is `None` only when the field is absent
///
/// Use with `#[serde(default)]`. A stored `null` document stays `Some(Null)`
/// instead of collapsing into a tombstone.
pub fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Current time in microseconds since the Unix epoch
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
