//! Local path index for maildisk.
//!
//! The mail backend can only look blocks up by `(tag, digest)`. This crate
//! keeps the human-facing side: which remote path currently points at which
//! root digest.
//!
//! # Modules
//!
//! - [`error`]: error types for index operations
//! - [`traits`]: the [`PathIndex`] trait
//! - [`memory`]: [`InMemoryPathIndex`] for tests and ephemeral use
//! - [`journal`]: [`JournalPathIndex`], an append-only file-backed index

pub mod error;
pub mod journal;
pub mod memory;
pub mod traits;

pub use error::{IndexError, Result};
pub use journal::{JournalPathIndex, SyncMode};
pub use memory::InMemoryPathIndex;
pub use traits::PathIndex;
