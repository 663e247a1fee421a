//! # maildisk-store
//!
//! Content-addressed block storage on a mail account.
//!
//! Each block is one message in a dedicated mailbox: the SHA-256 of the
//! block goes in the subject, the tag (`DATA` or `ATTR`) in the recipient
//! header, and the bytes, base64-encoded, in the body. Payloads larger than a
//! single block are split into a binary tree of blocks by [`ChunkCodec`].
//!
//! Layers, bottom up:
//!
//! - [`backend`]: the [`Connector`] / [`MailSession`] seam to a mail server.
//! - [`pool`]: a bounded, lazily connecting [`SessionPool`].
//! - [`block`]: the single-block [`BlockStore`] with dedup and verification.
//! - [`chunk`]: the recursive tree codec.
//! - [`namespace`]: the path-aware [`Namespacer`].
//!
//! [`memory::MemoryMailServer`] is an in-process backend for tests and local
//! experiments.

pub mod backend;
pub mod block;
pub mod chunk;
pub mod classify;
pub mod error;
pub mod memory;
pub mod namespace;
pub mod node;
pub mod pool;
pub mod record;

pub use backend::{Connector, MailSession, MessageId, SearchCriteria};
pub use block::BlockStore;
pub use chunk::ChunkCodec;
pub use error::{BackendError, BackendResult, StoreError, StoreResult};
pub use memory::MemoryMailServer;
pub use namespace::{Attribution, Namespacer};
pub use pool::{Credentials, PoolConfig, PooledSession, SessionPool, DEFAULT_MAILBOX};
