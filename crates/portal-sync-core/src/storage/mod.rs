//! Local storage layer
//!
//! Two local cache levels sit in front of the remote store:
//!
//! - **MemoryCache (L1)**: process-lifetime map, checked first, zero I/O
//! - **PersistentStore (L2)**: SQLite file, survives restarts, best-effort
//!
//! [`LocalCache`] composes them. Reads go L1 → L2 → caller fallback; writes
//! go to both synchronously. The fallback is never cached, so a miss stays
//! a miss until real data arrives.

pub mod error;
pub mod memory;
pub mod persistent;
pub mod schema;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryCache;
pub use persistent::PersistentStore;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};

use serde_json::Value;

/// Memory cache layered over the persistent store
pub struct LocalCache {
    memory: MemoryCache,
    persistent: PersistentStore,
}

impl LocalCache {
    pub fn new(persistent: PersistentStore) -> Self {
        Self {
            memory: MemoryCache::new(),
            persistent,
        }
    }

    /// Memory-only cache, as if the persistent store failed its probe
    pub fn memory_only() -> Self {
        Self::new(PersistentStore::unavailable())
    }

    /// Look a key up without a fallback
    ///
    /// An L2 hit is copied into L1 before returning, unless a write got
    /// into L1 first; then the newer L1 value is returned.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.memory.get(key) {
            return Some(value);
        }

        let value = self.persistent.get(key)?;
        Some(self.memory.insert_if_absent(key, value))
    }

    /// L1 → L2 → `fallback`
    pub fn read(&self, key: &str, fallback: Value) -> Value {
        self.get(key).unwrap_or(fallback)
    }

    /// Write to L1 then L2
    ///
    /// L1 is always updated, so the value is readable in this process even
    /// when L2 drops the write.
    pub fn write(&self, key: &str, value: Value) {
        self.memory.set(key, value.clone());
        self.persistent.write(key, &value);
    }

    /// Drop the memory level; the persistent level is untouched
    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn persistent(&self) -> &PersistentStore {
        &self.persistent
    }
}
