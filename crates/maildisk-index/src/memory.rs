//! In-memory path index for tests and ephemeral use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use maildisk_types::Digest;

use crate::error::{IndexError, Result};
use crate::traits::{scan_prefix, PathIndex};

/// A [`PathIndex`] held in a `BTreeMap` behind a `RwLock`. Data is lost when
/// the index is dropped.
#[derive(Debug, Default)]
pub struct InMemoryPathIndex {
    entries: RwLock<BTreeMap<String, Digest>>,
}

impl InMemoryPathIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PathIndex for InMemoryPathIndex {
    fn set(&self, path: &str, digest: Digest) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| IndexError::LockPoisoned)?;
        entries.insert(path.to_string(), digest);
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Digest>> {
        let entries = self.entries.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(entries.get(path).copied())
    }

    fn iterate_prefix(&self, prefix: &str) -> Result<Vec<(String, Digest)>> {
        let entries = self.entries.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(scan_prefix(&entries, prefix))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(|_| IndexError::LockPoisoned)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Digest {
        Digest::of(s.as_bytes())
    }

    #[test]
    fn set_get_overwrite() {
        let index = InMemoryPathIndex::new();
        assert_eq!(index.get("/a").unwrap(), None);

        index.set("/a", d("one")).unwrap();
        assert_eq!(index.get("/a").unwrap(), Some(d("one")));

        index.set("/a", d("two")).unwrap();
        assert_eq!(index.get("/a").unwrap(), Some(d("two")));
        assert_eq!(index.len().unwrap(), 1);
    }

    #[test]
    fn prefix_scan_is_ordered_and_bounded() {
        let index = InMemoryPathIndex::new();
        for path in ["/docs/b", "/docs/a", "/doc", "/e", "/docs/c/d"] {
            index.set(path, d(path)).unwrap();
        }

        let paths: Vec<String> = index
            .iterate_prefix("/docs/")
            .unwrap()
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(paths, vec!["/docs/a", "/docs/b", "/docs/c/d"]);

        assert_eq!(index.iterate_prefix("").unwrap().len(), 5);
        assert!(index.iterate_prefix("/zzz").unwrap().is_empty());
    }

    #[test]
    fn empty_index() {
        let index = InMemoryPathIndex::new();
        assert!(index.is_empty().unwrap());
    }
}
