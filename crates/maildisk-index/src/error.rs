//! Error types for path index operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Encoding or decoding a journal entry failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding index state was poisoned by a panicking writer.
    #[error("index lock poisoned")]
    LockPoisoned,

    /// I/O error on the journal file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
