//! Output enum for command execution results.
//!
//! Every command produces exactly one output type. The mapping is
//! deterministic: the same command always produces the same output variant.

use serde::{Deserialize, Serialize};

use docfeed_core::{Document, PatchEntry, Value};

use crate::Error;

/// Successful command execution results.
///
/// Each [`Command`](crate::Command) variant maps to exactly one `Output` variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Output {
    /// Ping response
    Pong {
        /// Crate version of the serving executor
        version: String,
    },

    /// Optional value (`Get`)
    ///
    /// Encoded as `{"value": v}` or `{}` so a `null` document is not
    /// mistaken for a missing one.
    Maybe(#[serde(with = "maybe_value")] Option<Value>),

    /// Value with version (`GetWithVersion`)
    VersionedValue(docfeed_core::VersionedValue),

    /// Boolean result (`Create`, `Remove`, `SetIfVersion`)
    Bool(bool),

    /// Query results (`Find`)
    Documents(Vec<Document>),

    /// Patches per key (`Poll`)
    Changes(Vec<(String, Vec<PatchEntry>)>),
}

impl Output {
    /// Variant name, for error messages
    pub fn name(&self) -> &'static str {
        match self {
            Output::Pong { .. } => "Pong",
            Output::Maybe(_) => "Maybe",
            Output::VersionedValue(_) => "VersionedValue",
            Output::Bool(_) => "Bool",
            Output::Documents(_) => "Documents",
            Output::Changes(_) => "Changes",
        }
    }
}

mod maybe_value {
    use docfeed_core::record::deserialize_present;
    use docfeed_core::Value;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct SlotRef<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<&'a Value>,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Slot {
        #[serde(default, deserialize_with = "deserialize_present")]
        value: Option<Value>,
    }

    pub fn serialize<S: Serializer>(value: &Option<Value>, serializer: S) -> Result<S::Ok, S::Error> {
        SlotRef {
            value: value.as_ref(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
        Slot::deserialize(deserializer).map(|slot| slot.value)
    }
}

/// JSON envelope returned by [`Executor::execute_json`](crate::Executor::execute_json)
///
/// Serializes as `{"ok": <output>}` or `{"err": <error>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    /// Command succeeded
    Ok(Output),
    /// Command failed
    Err(Error),
}

impl From<crate::Result<Output>> for Response {
    fn from(result: crate::Result<Output>) -> Self {
        match result {
            Ok(output) => Response::Ok(output),
            Err(err) => Response::Err(err),
        }
    }
}

impl From<Response> for crate::Result<Output> {
    fn from(response: Response) -> Self {
        match response {
            Response::Ok(output) => Ok(output),
            Response::Err(err) => Err(err),
        }
    }
}
