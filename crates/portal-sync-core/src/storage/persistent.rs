//! Persistent cache (L2)
//!
//! Durable key → serialized value store backed by SQLite. Survives process
//! restarts so the UI has something to show before the remote answers.
//!
//! Availability is probed once when the store is opened (write then delete
//! a sentinel row). If the probe fails the store stays in memory-only mode
//! for the rest of its life and every operation short-circuits. No
//! operation ever returns an error to the caller.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use crate::codec;

/// Key used by the availability probe
const PROBE_KEY: &str = "__portal_sync_probe__";

/// Best-effort persistent key-value store
pub struct PersistentStore {
    /// `None` when the probe failed or the store was opened unavailable
    conn: Option<Mutex<Connection>>,
}

impl PersistentStore {
    /// Open (or create) the database at `path`
    ///
    /// Never fails: an unusable database yields an unavailable store.
    pub fn open(path: &Path) -> Self {
        match Self::try_open(path) {
            Ok(conn) => Self::from_connection(conn),
            Err(e) => {
                warn!("Persistent cache disabled: {}", e);
                Self::unavailable()
            }
        }
    }

    /// Open a private in-memory database (durable for the process only)
    pub fn in_memory() -> Self {
        match Connection::open_in_memory() {
            Ok(conn) => Self::from_connection(conn),
            Err(e) => {
                warn!("In-memory cache database failed to open: {}", e);
                Self::unavailable()
            }
        }
    }

    /// A store that never persists anything
    pub fn unavailable() -> Self {
        Self { conn: None }
    }

    /// Wrap an existing connection, running schema setup and the probe
    pub fn from_connection(conn: Connection) -> Self {
        let schema = if needs_init(&conn) {
            init_schema(&conn).map_err(StorageError::from)
        } else {
            Ok(())
        };

        match schema.and_then(|_| probe(&conn)) {
            Ok(()) => {
                debug!("Persistent cache available");
                Self {
                    conn: Some(Mutex::new(conn)),
                }
            }
            Err(e) => {
                warn!("Persistent cache disabled: {}", e);
                Self::unavailable()
            }
        }
    }

    fn try_open(path: &Path) -> StorageResult<Connection> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        Connection::open(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether the availability probe succeeded
    pub fn is_available(&self) -> bool {
        self.conn.is_some()
    }

    /// Read a value, returning `fallback` when absent or unreadable
    pub fn read(&self, key: &str, fallback: Value) -> Value {
        self.get(key).unwrap_or(fallback)
    }

    /// Read a value if present and decodable
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(StorageError::Unavailable) => None,
            Err(e) => {
                warn!(key = %key, "Persistent cache read failed: {}", e);
                None
            }
        }
    }

    /// Persist a value; failures are logged and dropped
    pub fn write(&self, key: &str, value: &Value) {
        match self.try_write(key, value) {
            Ok(()) | Err(StorageError::Unavailable) => {}
            Err(e) if e.is_quota_exceeded() => {
                warn!(key = %key, "Persistent cache full, value kept in memory only");
            }
            Err(e) => warn!(key = %key, "Persistent cache write failed: {}", e),
        }
    }

    /// Remove a value; failures are logged and dropped
    pub fn remove(&self, key: &str) {
        let result = self.with_conn(|conn| {
            conn.execute("DELETE FROM entries WHERE key = ?1", [key])?;
            Ok(())
        });
        match result {
            Ok(()) | Err(StorageError::Unavailable) => {}
            Err(e) => warn!(key = %key, "Persistent cache delete failed: {}", e),
        }
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let result = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM entries ORDER BY key")?;
            let keys: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(keys)
        });
        result.unwrap_or_default()
    }

    /// When `key` was last written, if it is stored
    pub fn updated_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let result = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT updated_at FROM entries WHERE key = ?1",
                    [key],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?)
        });
        result.ok().flatten().and_then(from_millis)
    }

    /// Time of the most recent write to any key
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        let result = self.with_conn(|conn| {
            Ok(conn.query_row("SELECT MAX(updated_at) FROM entries", [], |row| {
                row.get::<_, Option<i64>>(0)
            })?)
        });
        result.ok().flatten().and_then(from_millis)
    }

    fn try_get(&self, key: &str) -> StorageResult<Option<Value>> {
        let text: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT value FROM entries WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?)
        })?;

        match text {
            Some(text) => Ok(Some(codec::decode(&text)?)),
            None => Ok(None),
        }
    }

    fn try_write(&self, key: &str, value: &Value) -> StorageResult<()> {
        let text = codec::encode(value)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, text, Utc::now().timestamp_millis()],
            )?;
            Ok(())
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let Some(conn) = &self.conn else {
            return Err(StorageError::Unavailable);
        };
        let guard = conn.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }
}

/// Write then delete a sentinel row
fn probe(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO entries (key, value, updated_at) VALUES (?1, 'true', ?2)",
        params![PROBE_KEY, Utc::now().timestamp_millis()],
    )
    .map_err(|e| StorageError::ProbeFailed(e.to_string()))?;
    conn.execute("DELETE FROM entries WHERE key = ?1", [PROBE_KEY])
        .map_err(|e| StorageError::ProbeFailed(e.to_string()))?;
    Ok(())
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
