/// Largest payload a single block (and therefore a single record) may carry.
pub const HARD_LIMIT: usize = 64 * 1024;

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Inline payload carried by an internal node; the remaining 64 bytes hold
/// the two child digests.
pub const SOFT_LIMIT: usize = HARD_LIMIT - 2 * DIGEST_LEN;
