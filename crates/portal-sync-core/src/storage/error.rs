//! Storage error handling
//!
//! The persistent cache never surfaces these to callers; they are logged
//! and the operation degrades to its fallback. They exist so the failure
//! reason is preserved in logs and in the availability probe.

use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;

/// Errors that can occur inside the persistent cache
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create the directory holding the database
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database file could not be opened
    #[error("Failed to open cache database '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The write-then-delete probe failed; the store is unusable
    #[error("Persistent cache unavailable: {0}")]
    ProbeFailed(String),

    /// Store was opened in, or downgraded to, memory-only mode
    #[error("Persistent cache is unavailable")]
    Unavailable,

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored value could not be encoded or decoded
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StorageError {
    /// Whether the error means the disk is out of room
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            StorageError::Database(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::DiskFull
            }
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_display() {
        let err = StorageError::Open {
            path: PathBuf::from("/data/portal-cache.db"),
            source: rusqlite::Error::InvalidQuery,
        };
        let msg = err.to_string();
        assert!(msg.contains("portal-cache.db"));
        assert!(!err.is_quota_exceeded());
    }

    #[test]
    fn test_disk_full_classification() {
        let err = StorageError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
            None,
        ));
        assert!(err.is_quota_exceeded());
    }

    #[test]
    fn test_codec_error_is_transparent() {
        let codec = crate::codec::decode("nope").unwrap_err();
        let err = StorageError::from(codec);
        assert!(err.to_string().starts_with("Failed to decode value"));
    }
}
