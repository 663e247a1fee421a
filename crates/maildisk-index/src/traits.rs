//! The [`PathIndex`] trait.

use maildisk_types::Digest;

use crate::error::Result;

/// Mapping from remote paths to root content digests.
///
/// Implementations must be thread-safe. `set` on an existing path replaces
/// its digest.
pub trait PathIndex: Send + Sync {
    fn set(&self, path: &str, digest: Digest) -> Result<()>;

    /// Returns `Ok(None)` if the path has never been set.
    fn get(&self, path: &str) -> Result<Option<Digest>>;

    /// Every entry whose path starts with `prefix`, in ascending path order.
    ///
    /// Pass `""` to list everything.
    fn iterate_prefix(&self, prefix: &str) -> Result<Vec<(String, Digest)>>;

    fn len(&self) -> Result<usize> {
        Ok(self.iterate_prefix("")?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop storage held by superseded entries and return the number of live
    /// entries kept. Indexes without such storage have nothing to do.
    fn compact(&self) -> Result<usize> {
        self.len()
    }
}

/// Prefix scan over an ordered map, shared by the implementations.
pub(crate) fn scan_prefix(
    map: &std::collections::BTreeMap<String, Digest>,
    prefix: &str,
) -> Vec<(String, Digest)> {
    map.range(prefix.to_string()..)
        .take_while(|(path, _)| path.starts_with(prefix))
        .map(|(path, digest)| (path.clone(), *digest))
        .collect()
}
