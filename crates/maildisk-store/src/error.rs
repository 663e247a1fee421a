use std::fmt;

use maildisk_types::Digest;

/// A raw failure reported by the mail backend.
///
/// The message is the backend's own text (for IMAP, the text of a `NO` or
/// `BAD` response). Only the classifier interprets it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BackendError {}

/// Result alias for raw backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record under the requested tag verified against the digest.
    #[error("content not found: {digest}")]
    ContentNotFound { digest: Digest },

    /// The backend rejected the configured credentials.
    #[error("login failed")]
    LoginFailed,

    /// The storage mailbox already exists. Expected when re-running init.
    #[error("mailbox already exists")]
    MailboxAlreadyExists,

    /// A session pool was configured with `max_connections = 0`.
    #[error("max_connections must be greater than zero")]
    MaxConnIsZero,

    /// Bootstrapping the storage mailbox failed for an unclassified reason.
    #[error("initialization failed: {reason}")]
    InitFailed { reason: String },

    /// A single block larger than the hard limit was handed to the store.
    #[error("block of {size} bytes exceeds the {limit} byte limit")]
    SizeExceeded { size: usize, limit: usize },

    /// A digest was not exactly 32 bytes long.
    #[error("invalid digest length: expected 32 bytes, got {actual}")]
    InvalidDigestLength { actual: usize },

    /// The pool has been closed and hands out no more sessions.
    #[error("session pool is closed")]
    PoolClosed,

    /// Backend failure matching no known pattern.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl StoreError {
    /// Conditions that are expected on a re-run and should be reported, not
    /// treated as failures.
    pub fn is_informational(&self) -> bool {
        matches!(self, StoreError::MailboxAlreadyExists)
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
