//! Reactive binding
//!
//! The surface UI code talks to. Reads are synchronous and never fail;
//! writes land in both local caches before returning and push to the remote
//! store in the background. Change notification carries no payload, so a
//! bound view re-reads when told.
//!
//! ```ignore
//! let binding = ctx.binding();
//! let _sub = binding.bind(&SharedResource::Classes.into(), move || refresh());
//!
//! binding.write(&SharedResource::Classes.into(), json!([{"id": "a"}]));
//!
//! // Optional: wait for the remote write
//! binding
//!     .write(&PrivateResource::Bookmarks.into(), json!(["q-17"]))
//!     .wait()
//!     .await?;
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::bus::{HydrationScope, Subscription, Topic};
use crate::codec;
use crate::context::SyncContext;
use crate::error::SyncError;
use crate::registry::{ResolvedKey, ResourceId};
use crate::remote::RemoteResult;
use crate::writer::RemoteWrite;

/// Read/write/bind access to resources of one [`SyncContext`]
#[derive(Clone)]
pub struct ReactiveBinding {
    ctx: Arc<SyncContext>,
}

impl ReactiveBinding {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Current local value, or the resource's registered fallback
    pub fn read(&self, resource: &ResourceId) -> Value {
        self.read_or(resource, resource.fallback())
    }

    /// Current local value, or `fallback`
    ///
    /// The fallback is never cached. A private resource with nobody logged
    /// in always reads as `fallback`.
    pub fn read_or(&self, resource: &ResourceId, fallback: Value) -> Value {
        match self.ctx.resolve(resource) {
            Some(key) => self.ctx.local().read(&key.storage, fallback),
            None => fallback,
        }
    }

    /// Current value decoded into `T`; `None` if it does not fit
    pub fn read_as<T: DeserializeOwned>(&self, resource: &ResourceId) -> Option<T> {
        match codec::from_value(self.read(resource)) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(resource = %resource, "Cached value has unexpected shape: {}", e);
                None
            }
        }
    }

    /// Call `on_change` whenever `resource` is written or hydrated
    pub fn bind<F>(&self, resource: &ResourceId, on_change: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ctx
            .bus()
            .subscribe(resource.logical_key(), Arc::new(on_change))
    }

    /// Call `callback` whenever a hydration batch of `scope` settles
    pub fn on_hydrated<F>(&self, scope: HydrationScope, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ctx
            .bus()
            .subscribe_topic(Topic::Hydrated(scope), Arc::new(callback))
    }

    /// Write through both local caches, push to the remote store in the
    /// background, then notify subscribers
    ///
    /// The local write has happened by the time this returns, whatever the
    /// remote does. The returned [`WriteAck`] reports the remote outcome and
    /// may be dropped.
    pub fn write(&self, resource: &ResourceId, value: Value) -> WriteAck {
        let Some(key) = self.ctx.resolve(resource) else {
            warn!(resource = %resource, "Write to private resource with nobody logged in dropped");
            return WriteAck::ready(Err(SyncError::NotAuthenticated));
        };

        self.ctx.store(&key, value.clone());
        let ack = self.push_remote(resource, &key, value);
        self.ctx.notify(&key);
        ack
    }

    /// Read, transform and write back in one synchronous step
    pub fn update<F>(&self, resource: &ResourceId, f: F) -> WriteAck
    where
        F: FnOnce(Value) -> Value,
    {
        let current = self.read(resource);
        self.write(resource, f(current))
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    fn push_remote(&self, resource: &ResourceId, key: &ResolvedKey, value: Value) -> WriteAck {
        let (ack, rx) = oneshot::channel();
        let write = RemoteWrite {
            resource: resource.clone(),
            remote_key: key.remote_key,
            partition: key.partition.clone(),
            value,
            ack,
        };

        match self.ctx.writer().submit(write) {
            Ok(()) => WriteAck::pending(rx),
            Err(e) => {
                warn!(resource = %resource, "Remote write skipped: {}", e);
                WriteAck::ready(Err(e))
            }
        }
    }
}

impl fmt::Debug for ReactiveBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveBinding")
            .field("current_user", &self.ctx.current_user())
            .finish()
    }
}

/// Outcome of the remote half of a write
///
/// Dropping it leaves the remote write running.
pub struct WriteAck {
    state: AckState,
}

enum AckState {
    Pending(oneshot::Receiver<RemoteResult<()>>),
    Ready(Result<(), SyncError>),
}

impl WriteAck {
    fn pending(rx: oneshot::Receiver<RemoteResult<()>>) -> Self {
        Self {
            state: AckState::Pending(rx),
        }
    }

    fn ready(result: Result<(), SyncError>) -> Self {
        Self {
            state: AckState::Ready(result),
        }
    }

    /// Whether the outcome was known when the write returned
    pub fn is_ready(&self) -> bool {
        matches!(self.state, AckState::Ready(_))
    }

    /// Wait for the remote store to accept or reject the write
    pub async fn wait(self) -> Result<(), SyncError> {
        match self.state {
            AckState::Ready(result) => result,
            AckState::Pending(rx) => match rx.await {
                Ok(result) => result.map_err(SyncError::from),
                Err(_) => Err(SyncError::AckDropped),
            },
        }
    }
}

impl fmt::Debug for WriteAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            AckState::Pending(_) => f.write_str("WriteAck(pending)"),
            AckState::Ready(result) => write!(f, "WriteAck({:?})", result),
        }
    }
}
