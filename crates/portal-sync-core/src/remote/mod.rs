//! Remote store (L3)
//!
//! The authoritative copy of every resource lives in a remote partitioned
//! key-value service reachable only through async calls.
//!
//! ## Partitions
//!
//! - `shared`: visible to every user
//! - `private:{user}`: one namespace per user
//!
//! Partitions are namespaces only; see [`Partition::qualify`].
//!
//! Implementations report failures as [`RemoteError`]. The sync layer turns
//! every error into "absent" (reads) or "write lost" (writes), so nothing
//! here ever reaches the UI as an error.

mod memory;
mod message;
mod ws;

pub use memory::MemoryRemote;
pub use message::{ClientMessage, ServerMessage};
pub use ws::WsRemote;

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::registry::Partition;

/// Errors reported by a remote store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection could not be established or was lost mid-call
    #[error("Remote store unreachable: {0}")]
    Unreachable(String),

    /// No reply within the configured timeout
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// Reply could not be encoded, decoded or matched to the request
    #[error("Remote protocol error: {0}")]
    Protocol(String),

    /// The remote answered with an error
    #[error("Remote store error: {0}")]
    Server(String),

    /// Remote sync is disabled
    #[error("Remote store is offline")]
    Offline,
}

impl RemoteError {
    /// Whether trying again later might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_) | RemoteError::Timeout(_))
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Async partitioned key-value service
pub trait RemoteStore: Send + Sync {
    /// Fetch a value; `Ok(None)` means the key does not exist remotely
    fn get<'a>(
        &'a self,
        key: &'a str,
        partition: &'a Partition,
    ) -> BoxFuture<'a, RemoteResult<Option<Value>>>;

    /// Store a value
    fn set<'a>(
        &'a self,
        key: &'a str,
        partition: &'a Partition,
        value: Value,
    ) -> BoxFuture<'a, RemoteResult<()>>;
}

/// Remote store used when sync is disabled; every call fails with
/// [`RemoteError::Offline`]
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineRemote;

impl RemoteStore for OfflineRemote {
    fn get<'a>(
        &'a self,
        _key: &'a str,
        _partition: &'a Partition,
    ) -> BoxFuture<'a, RemoteResult<Option<Value>>> {
        Box::pin(async { Err(RemoteError::Offline) })
    }

    fn set<'a>(
        &'a self,
        _key: &'a str,
        _partition: &'a Partition,
        _value: Value,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async { Err(RemoteError::Offline) })
    }
}
