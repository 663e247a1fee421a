//! High-level SDK for maildisk.
//!
//! [`MailDisk`] ties the content store, which lives in a mailbox, to the
//! local [`PathIndex`](maildisk_index::PathIndex) that remembers which path
//! points at which root digest. [`DiskConfig`] carries everything needed to
//! open one.

pub mod config;
pub mod disk;
pub mod error;

pub use config::DiskConfig;
pub use disk::MailDisk;
pub use error::{SdkError, SdkResult};

// Re-export key types
pub use maildisk_index::{InMemoryPathIndex, JournalPathIndex, PathIndex};
pub use maildisk_store::{Connector, MemoryMailServer, StoreError};
pub use maildisk_types::{Digest, HARD_LIMIT, SOFT_LIMIT};
