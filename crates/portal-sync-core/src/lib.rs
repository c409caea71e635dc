//! Portal Sync Core Library
//!
//! Local-first data layer for the academic portal. UI code reads and writes
//! resources synchronously against local caches; writes are pushed to the
//! remote store in the background, and remote truth is pulled in by
//! hydration batches at startup and login.
//!
//! # Architecture
//!
//! - **MemoryCache (L1)**: process-lifetime map, always consulted first
//! - **PersistentStore (L2)**: SQLite key-value table, best effort
//! - **RemoteStore (L3)**: async partitioned store (WebSocket or in-memory)
//!
//! # Quick Start
//!
//! ```text
//! let ctx = SyncContext::open(&Config::load()?);
//! ctx.hydrator().hydrate_shared().await;
//!
//! let binding = ctx.binding();
//! let _sub = binding.bind(&SharedResource::Classes.into(), || redraw());
//! binding.write(&SharedResource::Classes.into(), json!([{"id": "a"}]));
//!
//! ctx.login("u1").await?;
//! let results = binding.read(&PrivateResource::Results.into());
//! ```
//!
//! # Modules
//!
//! - `context`: Session object owning caches, remote and subscriptions
//! - `binding`: Read / write / bind surface
//! - `hydration`: Remote-to-local batch pulls
//! - `registry`: Resource identifiers and key naming
//! - `storage`: Memory and SQLite caches
//! - `remote`: Remote store trait and clients
//! - `bus`: Change subscriptions
//! - `writer`: Ordered background remote writes
//! - `codec`: JSON value encoding
//! - `config`: Application configuration

pub mod binding;
pub mod bus;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod hydration;
pub mod registry;
pub mod remote;
pub mod storage;
mod writer;

pub use binding::{ReactiveBinding, WriteAck};
pub use bus::{HydrationScope, Subscription, SubscriptionBus, Topic};
pub use codec::CodecError;
pub use config::Config;
pub use context::{StorageStatus, SyncContext};
pub use error::SyncError;
pub use hydration::{
    HydrationCoordinator, HydrationEvent, HydrationReport, JobOutcome, JobReport,
};
pub use registry::{Partition, PrivateResource, ResourceId, SharedResource, UserId};
pub use remote::{MemoryRemote, OfflineRemote, RemoteError, RemoteStore, WsRemote};
pub use storage::{LocalCache, MemoryCache, PersistentStore, StorageError};
