//! Byte layout of tree nodes.
//!
//! A block shorter than [`HARD_LIMIT`] is a leaf and holds application bytes
//! verbatim. A block of exactly [`HARD_LIMIT`] bytes is an internal node:
//!
//! ```text
//! [SOFT_LIMIT bytes: inline payload ("this")]
//! [32 bytes: left child digest]
//! [32 bytes: right child digest]
//! ```
//!
//! Reassembly yields `this || left || right`.

use maildisk_types::{Digest, DIGEST_LEN, HARD_LIMIT, SOFT_LIMIT};

/// Decoded view of an internal node.
#[derive(Debug, PartialEq, Eq)]
pub struct InternalNode<'a> {
    pub this: &'a [u8],
    pub left: Digest,
    pub right: Digest,
}

impl<'a> InternalNode<'a> {
    /// Returns `None` unless `block` is exactly [`HARD_LIMIT`] bytes long.
    pub fn decode(block: &'a [u8]) -> Option<Self> {
        if block.len() != HARD_LIMIT {
            return None;
        }
        let (this, digests) = block.split_at(SOFT_LIMIT);
        let (left, right) = digests.split_at(DIGEST_LEN);
        Some(Self {
            this,
            left: Digest::from_slice(left).ok()?,
            right: Digest::from_slice(right).ok()?,
        })
    }
}

/// Encode an internal node. `this` must be exactly [`SOFT_LIMIT`] bytes.
pub fn encode_internal(this: &[u8], left: &Digest, right: &Digest) -> Vec<u8> {
    debug_assert_eq!(this.len(), SOFT_LIMIT);
    let mut block = Vec::with_capacity(HARD_LIMIT);
    block.extend_from_slice(this);
    block.extend_from_slice(left.as_bytes());
    block.extend_from_slice(right.as_bytes());
    block
}

/// Offset, measured from the start of a payload of `len >= HARD_LIMIT`
/// bytes, where the left remainder ends and the right one begins.
///
/// Always `SOFT_LIMIT <= boundary < len`, so both children are strictly
/// smaller than their parent.
pub fn boundary(len: usize) -> usize {
    let soft_blocks = len.div_ceil(SOFT_LIMIT);
    soft_blocks.div_ceil(2) * SOFT_LIMIT
}
