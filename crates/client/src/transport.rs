//! Transport abstraction between the client and the store
//!
//! [`StoreApi`] mirrors the store's wire contract one call per command.
//! [`LocalTransport`] carries each call as JSON through an in-process
//! [`Executor`], the same bytes a network transport would send.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use docfeed_core::{Document, PatchEntry, Query, Value, Version, VersionedValue};
use docfeed_executor::{Command, Executor, Output, Response};

use crate::error::{ClientError, Result};

/// Patches newer than a poller's version, per key
pub type Changes = Vec<(String, Vec<PatchEntry>)>;

/// Blocking client view of a document store
///
/// Thread safety: implementations are shared between the caller's threads
/// and the subscription hub's poll thread.
pub trait StoreApi: Send + Sync {
    /// Current value of `key`
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Current value and version of `key`
    fn get_with_version(&self, key: &str) -> Result<VersionedValue>;

    /// Create `key` if absent or deleted
    fn create(&self, key: &str, value: Value) -> Result<bool>;

    /// Delete `key`
    fn remove(&self, key: &str) -> Result<bool>;

    /// Compare-and-swap write
    fn set_if_version(&self, key: &str, version: Version, value: Value) -> Result<bool>;

    /// Query live documents
    fn find(&self, query: &Query) -> Result<Vec<Document>>;

    /// Long-poll for patches newer than the given versions
    fn poll(&self, entries: &[(String, Version)], timeout: Option<Duration>) -> Result<Changes>;
}

/// [`StoreApi`] over an in-process [`Executor`], via its JSON boundary
#[derive(Clone)]
pub struct LocalTransport {
    executor: Arc<Executor>,
}

impl LocalTransport {
    /// Wrap an executor
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    /// Send one command and decode the reply
    pub fn call(&self, cmd: Command) -> Result<Output> {
        let name = cmd.name();
        let request = serde_json::to_string(&cmd)
            .map_err(|e| ClientError::Transport(format!("failed to encode {}: {}", name, e)))?;
        let reply = self.executor.execute_json(&request);
        trace!(command = name, request_bytes = request.len(), reply_bytes = reply.len(), "round trip");
        let response: Response = serde_json::from_str(&reply)
            .map_err(|e| ClientError::Transport(format!("failed to decode reply to {}: {}", name, e)))?;
        match response {
            Response::Ok(output) => Ok(output),
            Response::Err(err) => Err(ClientError::Store(err)),
        }
    }
}

fn unexpected(command: &str, output: &Output) -> ClientError {
    ClientError::Transport(format!(
        "unexpected {} reply to {}",
        output.name(),
        command
    ))
}

impl StoreApi for LocalTransport {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        match self.call(Command::Get { key: key.into() })? {
            Output::Maybe(value) => Ok(value),
            other => Err(unexpected("Get", &other)),
        }
    }

    fn get_with_version(&self, key: &str) -> Result<VersionedValue> {
        match self.call(Command::GetWithVersion { key: key.into() })? {
            Output::VersionedValue(v) => Ok(v),
            other => Err(unexpected("GetWithVersion", &other)),
        }
    }

    fn create(&self, key: &str, value: Value) -> Result<bool> {
        match self.call(Command::Create {
            key: key.into(),
            value,
            operation_id: None,
        })? {
            Output::Bool(created) => Ok(created),
            other => Err(unexpected("Create", &other)),
        }
    }

    fn remove(&self, key: &str) -> Result<bool> {
        match self.call(Command::Remove {
            key: key.into(),
            operation_id: None,
        })? {
            Output::Bool(removed) => Ok(removed),
            other => Err(unexpected("Remove", &other)),
        }
    }

    fn set_if_version(&self, key: &str, version: Version, value: Value) -> Result<bool> {
        match self.call(Command::SetIfVersion {
            key: key.into(),
            version,
            value,
            operation_id: None,
        })? {
            Output::Bool(written) => Ok(written),
            other => Err(unexpected("SetIfVersion", &other)),
        }
    }

    fn find(&self, query: &Query) -> Result<Vec<Document>> {
        match self.call(Command::Find {
            query: query.clone(),
        })? {
            Output::Documents(docs) => Ok(docs),
            other => Err(unexpected("Find", &other)),
        }
    }

    fn poll(&self, entries: &[(String, Version)], timeout: Option<Duration>) -> Result<Changes> {
        let timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        match self.call(Command::Poll {
            entries: entries.to_vec(),
            timeout_ms,
        })? {
            Output::Changes(changes) => Ok(changes),
            other => Err(unexpected("Poll", &other)),
        }
    }
}
