//! Sync layer errors
//!
//! Reads never fail and writes never fail locally. These errors only reach
//! code that explicitly asks: a caller awaiting a [`WriteAck`], a caller of
//! [`SyncContext::login`], or the CLI.
//!
//! [`WriteAck`]: crate::binding::WriteAck
//! [`SyncContext::login`]: crate::context::SyncContext::login

use thiserror::Error;

use crate::remote::RemoteError;

/// Errors visible outside the sync layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The remote write failed; the local value is still in place
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A private resource was written with nobody logged in
    #[error("No user is logged in")]
    NotAuthenticated,

    /// `login` was called for a different user without `reset` in between
    #[error("Already logged in as '{current}'")]
    AlreadyAuthenticated { current: String },

    /// The write happened outside a tokio runtime, so the remote write was
    /// never issued
    #[error("No async runtime available to issue the remote write")]
    RuntimeUnavailable,

    /// The remote write task ended without reporting a result
    #[error("Remote write task ended without reporting")]
    AckDropped,
}

impl SyncError {
    /// Whether local state was updated despite the error
    pub fn is_local_committed(&self) -> bool {
        matches!(
            self,
            SyncError::Remote(_) | SyncError::RuntimeUnavailable | SyncError::AckDropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_is_transparent() {
        let err = SyncError::from(RemoteError::Offline);
        assert_eq!(err.to_string(), "Remote store is offline");
        assert!(err.is_local_committed());
    }

    #[test]
    fn test_not_authenticated_commits_nothing() {
        assert!(!SyncError::NotAuthenticated.is_local_committed());
        let err = SyncError::AlreadyAuthenticated {
            current: "u1".to_string(),
        };
        assert!(err.to_string().contains("u1"));
    }
}
