//! Foundation types for maildisk.
//!
//! maildisk stores content-addressed blocks as messages inside an ordinary
//! mailbox account. This crate holds the vocabulary every other maildisk
//! crate shares.
//!
//! # Key Types
//!
//! - [`Digest`]: SHA-256 identity of a block
//! - [`Tag`]: namespace separating content trees from path attributions
//! - [`HARD_LIMIT`] / [`SOFT_LIMIT`]: block size bounds

pub mod digest;
pub mod error;
pub mod limits;
pub mod tag;

pub use digest::Digest;
pub use error::TypeError;
pub use limits::{DIGEST_LEN, HARD_LIMIT, SOFT_LIMIT};
pub use tag::Tag;
