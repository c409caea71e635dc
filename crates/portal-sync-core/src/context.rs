//! Sync session context
//!
//! A [`SyncContext`] owns everything with session lifetime: the local
//! caches, the remote store handle, the subscription bus, the current user
//! and the hydration broadcast channel. It is created at session start,
//! [`reset`](SyncContext::reset) at logout, and shared as `Arc<SyncContext>`
//! with the bindings and the hydration coordinator.
//!
//! ```ignore
//! let ctx = SyncContext::open(&config);
//! ctx.hydrator().hydrate_shared().await;
//!
//! let binding = ctx.binding();
//! let classes = binding.read(&SharedResource::Classes.into());
//!
//! ctx.login("u1").await?;
//! ```

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::binding::ReactiveBinding;
use crate::bus::SubscriptionBus;
use crate::config::Config;
use crate::error::SyncError;
use crate::hydration::{HydrationCoordinator, HydrationEvent, HydrationReport};
use crate::registry::{ResolvedKey, ResourceId, UserId};
use crate::remote::{OfflineRemote, RemoteStore, WsRemote};
use crate::storage::{LocalCache, PersistentStore};
use crate::writer::RemoteWriter;

/// Capacity of the hydration broadcast channel
const EVENT_CAPACITY: usize = 16;

/// Snapshot of local storage state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStatus {
    /// Whether the persistent cache passed its probe
    pub persistent_available: bool,
    /// Keys held by the persistent cache
    pub persistent_keys: Vec<String>,
    /// Number of entries in the memory cache
    pub memory_entries: usize,
    /// Most recent write to the persistent cache
    pub last_updated: Option<DateTime<Utc>>,
}

/// Session-scoped sync state
pub struct SyncContext {
    local: LocalCache,
    remote: Arc<dyn RemoteStore>,
    writer: RemoteWriter,
    bus: SubscriptionBus,
    current_user: RwLock<Option<UserId>>,
    events: broadcast::Sender<HydrationEvent>,
}

impl SyncContext {
    /// Create a context from explicit parts
    pub fn create(local: LocalCache, remote: Arc<dyn RemoteStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            local,
            writer: RemoteWriter::new(remote.clone()),
            remote,
            bus: SubscriptionBus::new(),
            current_user: RwLock::new(None),
            events,
        })
    }

    /// Create a context wired from configuration
    ///
    /// Uses the SQLite cache under `data_dir` unless `persistent_cache` is
    /// off, and the WebSocket remote when it is enabled and has a URL.
    pub fn open(config: &Config) -> Arc<Self> {
        let persistent = if config.persistent_cache {
            PersistentStore::open(&config.cache_db_path())
        } else {
            PersistentStore::unavailable()
        };

        let remote: Arc<dyn RemoteStore> = match config.active_remote_url() {
            Some(url) => {
                debug!("Using remote store at {}", url);
                Arc::new(WsRemote::new(url, config.remote_timeout()))
            }
            None => {
                debug!("Remote store disabled, running offline");
                Arc::new(OfflineRemote)
            }
        };

        Self::create(LocalCache::new(persistent), remote)
    }

    /// Set the current user and hydrate their private resources
    ///
    /// Logging in again as the same user just re-hydrates.
    pub async fn login(self: &Arc<Self>, user: &str) -> Result<HydrationReport, SyncError> {
        {
            let mut current = self
                .current_user
                .write()
                .unwrap_or_else(|e| e.into_inner());
            match current.as_deref() {
                Some(existing) if existing != user => {
                    return Err(SyncError::AlreadyAuthenticated {
                        current: existing.to_string(),
                    });
                }
                _ => *current = Some(user.to_string()),
            }
        }

        info!(user = %user, "Logged in");
        Ok(self.hydrator().hydrate_user().await)
    }

    /// End the session: forget the user and the memory cache
    ///
    /// The persistent cache and live subscriptions are kept.
    pub fn reset(&self) {
        *self
            .current_user
            .write()
            .unwrap_or_else(|e| e.into_inner()) = None;
        self.local.clear_memory();
        info!("Session reset");
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.current_user
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Resolve a resource against the current user
    pub fn resolve(&self, resource: &ResourceId) -> Option<ResolvedKey> {
        resource.resolve(self.current_user().as_deref())
    }

    pub fn binding(self: &Arc<Self>) -> ReactiveBinding {
        ReactiveBinding::new(self.clone())
    }

    pub fn hydrator(self: &Arc<Self>) -> HydrationCoordinator {
        HydrationCoordinator::new(self.clone())
    }

    /// Receive `SharedHydrated` / `UserHydrated` broadcasts
    pub fn hydration_events(&self) -> broadcast::Receiver<HydrationEvent> {
        self.events.subscribe()
    }

    pub fn storage_status(&self) -> StorageStatus {
        StorageStatus {
            persistent_available: self.local.persistent().is_available(),
            persistent_keys: self.local.persistent().keys(),
            memory_entries: self.local.memory().len(),
            last_updated: self.local.persistent().last_updated(),
        }
    }

    pub fn bus(&self) -> &SubscriptionBus {
        &self.bus
    }

    pub(crate) fn local(&self) -> &LocalCache {
        &self.local
    }

    pub(crate) fn remote(&self) -> Arc<dyn RemoteStore> {
        self.remote.clone()
    }

    /// Ordered queue for remote writes
    pub(crate) fn writer(&self) -> &RemoteWriter {
        &self.writer
    }

    /// Write a value through both cache levels
    ///
    /// The only place the local caches are mutated.
    pub(crate) fn store(&self, key: &ResolvedKey, value: Value) {
        self.local.write(&key.storage, value);
    }

    pub(crate) fn notify(&self, key: &ResolvedKey) {
        self.bus.notify(key.logical);
    }

    /// Store a value and tell subscribers
    pub(crate) fn commit(&self, key: &ResolvedKey, value: Value) {
        self.store(key, value);
        self.notify(key);
    }

    pub(crate) fn broadcast(&self, event: HydrationEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}
