//! In-process remote store
//!
//! Keeps remote contents in a shared map. Clones share state, so a test (or
//! an embedding application) can hold one handle while the sync layer holds
//! another. Individual keys can be made to fail to simulate partial outages,
//! or held to simulate a slow or hung call.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Notify;

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::registry::Partition;

#[derive(Debug, Default)]
struct Inner {
    /// Values by qualified key (`shared:classes`, `private:u1:results`)
    values: HashMap<String, Value>,
    /// Qualified keys whose calls fail
    failing: HashSet<String>,
    /// Every call fails
    offline: bool,
    /// Number of successful `set` calls
    writes: usize,
    /// Held keys; calls wait on the gate until it is released
    gates: HashMap<String, Arc<Notify>>,
}

/// Shared in-memory remote store
#[derive(Debug, Default, Clone)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value directly, bypassing failure injection
    pub fn insert(&self, key: &str, partition: &Partition, value: Value) {
        self.lock().values.insert(partition.qualify(key), value);
    }

    /// Current remote value, bypassing failure injection
    pub fn value(&self, key: &str, partition: &Partition) -> Option<Value> {
        self.lock().values.get(&partition.qualify(key)).cloned()
    }

    /// Make every call for one key fail as unreachable
    pub fn fail_key(&self, key: &str, partition: &Partition) {
        self.lock().failing.insert(partition.qualify(key));
    }

    /// Undo [`MemoryRemote::fail_key`]
    pub fn heal_key(&self, key: &str, partition: &Partition) {
        self.lock().failing.remove(&partition.qualify(key));
    }

    /// Make every call fail as unreachable
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Hold calls for one key until [`MemoryRemote::release_key`]
    pub fn hold_key(&self, key: &str, partition: &Partition) {
        self.lock()
            .gates
            .entry(partition.qualify(key))
            .or_insert_with(|| Arc::new(Notify::new()));
    }

    /// Let the held call for one key through
    ///
    /// Works whether or not the call has started waiting yet.
    pub fn release_key(&self, key: &str, partition: &Partition) {
        if let Some(gate) = self.lock().gates.remove(&partition.qualify(key)) {
            gate.notify_one();
        }
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Snapshot of all stored values by qualified key
    pub fn contents(&self) -> HashMap<String, Value> {
        self.lock().values.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pass_gate(&self, qualified: &str) {
        // Guard must be gone before the await
        let gate = self.lock().gates.get(qualified).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn check(inner: &Inner, qualified: &str) -> RemoteResult<()> {
        if inner.offline || inner.failing.contains(qualified) {
            return Err(RemoteError::Unreachable(format!(
                "simulated outage for {}",
                qualified
            )));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    fn get<'a>(
        &'a self,
        key: &'a str,
        partition: &'a Partition,
    ) -> BoxFuture<'a, RemoteResult<Option<Value>>> {
        Box::pin(async move {
            // Yield once so concurrent callers genuinely interleave
            tokio::task::yield_now().await;

            let qualified = partition.qualify(key);
            self.pass_gate(&qualified).await;
            let inner = self.lock();
            Self::check(&inner, &qualified)?;
            Ok(inner.values.get(&qualified).cloned())
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        partition: &'a Partition,
        value: Value,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            tokio::task::yield_now().await;

            let qualified = partition.qualify(key);
            self.pass_gate(&qualified).await;
            let mut inner = self.lock();
            Self::check(&inner, &qualified)?;
            inner.values.insert(qualified, value);
            inner.writes += 1;
            Ok(())
        })
    }
}
