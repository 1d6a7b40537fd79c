//! The Executor - single entry point to the document store.
//!
//! The Executor is a stateless dispatcher that routes commands to the
//! store's operations and converts results to outputs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use docfeed_engine::{DocumentStore, WriteOptions};

use crate::output::Response;
use crate::{Command, Error, Output, Result};

/// The command executor - single entry point to the document store.
///
/// The Executor is **stateless**: it holds a reference to the store but
/// maintains no state of its own.
///
/// # Thread Safety
///
/// Executor is `Send + Sync` and can be shared across request threads.
/// A blocked `Poll` holds only its own thread.
///
/// # Example
///
/// ```ignore
/// use docfeed_executor::{Command, Executor};
///
/// let executor = Executor::new(Arc::new(DocumentStore::in_memory()));
/// let reply = executor.execute_json(r#"{"Get": {"key": "user:1"}}"#);
/// ```
pub struct Executor {
    store: Arc<DocumentStore>,
}

impl Executor {
    /// Create a new executor wrapping a store.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// The wrapped store
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Execute a single command.
    ///
    /// Returns the command result or an error.
    pub fn execute(&self, cmd: Command) -> Result<Output> {
        trace!(command = cmd.name(), "execute");
        match cmd {
            Command::Ping => Ok(Output::Pong {
                version: env!("CARGO_PKG_VERSION").to_string(),
            }),
            Command::Get { key } => Ok(Output::Maybe(self.store.get(&key)?)),
            Command::GetWithVersion { key } => {
                Ok(Output::VersionedValue(self.store.get_with_version(&key)?))
            }
            Command::Create {
                key,
                value,
                operation_id,
            } => Ok(Output::Bool(self.store.create_with(
                &key,
                value,
                WriteOptions { operation_id },
            )?)),
            Command::Remove { key, operation_id } => Ok(Output::Bool(
                self.store.remove_with(&key, WriteOptions { operation_id })?,
            )),
            Command::SetIfVersion {
                key,
                version,
                value,
                operation_id,
            } => Ok(Output::Bool(self.store.set_if_version_with(
                &key,
                version,
                value,
                WriteOptions { operation_id },
            )?)),
            Command::Find { query } => Ok(Output::Documents(self.store.find(&query)?)),
            Command::Poll {
                entries,
                timeout_ms,
            } => {
                let timeout = timeout_ms.map(Duration::from_millis);
                Ok(Output::Changes(self.store.poll(&entries, timeout)?))
            }
        }
    }

    /// Execute a JSON-encoded command and return a JSON-encoded [`Response`].
    ///
    /// Malformed requests produce `{"err": {"InvalidCommand": ...}}`; this
    /// function itself never fails.
    pub fn execute_json(&self, request: &str) -> String {
        let result = match serde_json::from_str::<Command>(request) {
            Ok(cmd) => self.execute(cmd),
            Err(e) => {
                debug!(error = %e, "rejected malformed command");
                Err(Error::InvalidCommand {
                    reason: e.to_string(),
                })
            }
        };
        encode_response(&Response::from(result))
    }
}

fn encode_response(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        let fallback = Response::Err(Error::Serialization {
            reason: e.to_string(),
        });
        serde_json::to_string(&fallback)
            .unwrap_or_else(|_| r#"{"err":{"Internal":{"reason":"unencodable response"}}}"#.to_string())
    })
}
