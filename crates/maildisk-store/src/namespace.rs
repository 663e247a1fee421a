//! Path-aware front of the store.
//!
//! Content lives under the `DATA` tag. Every put also records an attribution
//! blob (`root digest || path`) under the `ATTR` tag, so the path a payload was
//! stored under can be recovered from the mailbox alone.

use maildisk_types::{Digest, Tag, DIGEST_LEN};
use tracing::debug;

use crate::backend::Connector;
use crate::block::BlockStore;
use crate::chunk::ChunkCodec;
use crate::error::{StoreError, StoreResult};
use crate::pool::{PoolConfig, SessionPool};

/// Bytes recorded under the `ATTR` tag for a payload stored at `path`.
pub fn attribution(root: &Digest, path: &str) -> Vec<u8> {
    let mut blob = Vec::with_capacity(DIGEST_LEN + path.len());
    blob.extend_from_slice(root.as_bytes());
    blob.extend_from_slice(path.as_bytes());
    blob
}

/// An attribution record read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub root: Digest,
    pub path: String,
}

pub struct Namespacer<C: Connector> {
    store: BlockStore<C>,
}

impl<C: Connector> Namespacer<C> {
    pub fn new(store: BlockStore<C>) -> Self {
        Self { store }
    }

    pub fn connect(connector: C, config: PoolConfig) -> StoreResult<Self> {
        Ok(Self::new(BlockStore::new(SessionPool::new(connector, config)?)))
    }

    pub fn store(&self) -> &BlockStore<C> {
        &self.store
    }

    /// Create the storage mailbox. See [`SessionPool::init`].
    pub async fn init(&self) -> StoreResult<()> {
        self.store.pool().init().await
    }

    /// Store `data`, record that it was written at `path`, and return the
    /// root digest of the content tree.
    ///
    /// The root digest depends on `data` alone. A failure while writing the
    /// attribution fails the whole put.
    pub async fn put(&self, path: &str, data: &[u8]) -> StoreResult<Digest> {
        let codec = ChunkCodec::new(&self.store);
        let root = codec.split(Tag::DATA, data).await?;
        let attr = codec.split(Tag::ATTR, &attribution(&root, path)).await?;
        debug!(path, root = %root.short_hex(), attr = %attr.short_hex(), "stored payload");
        Ok(root)
    }

    /// Reassemble the payload rooted at `root`.
    pub async fn get(&self, root: &[u8]) -> StoreResult<Vec<u8>> {
        ChunkCodec::new(&self.store).join(Tag::DATA, root).await
    }

    /// Read back an attribution record by its own digest.
    ///
    /// A stored blob too short to carry a root is not an attribution record
    /// and is reported as [`StoreError::ContentNotFound`].
    pub async fn attribution(&self, digest: &[u8]) -> StoreResult<Attribution> {
        let requested = Digest::from_slice(digest).map_err(|_| {
            StoreError::InvalidDigestLength {
                actual: digest.len(),
            }
        })?;
        let blob = ChunkCodec::new(&self.store).join(Tag::ATTR, digest).await?;
        let not_attribution = || StoreError::ContentNotFound { digest: requested };
        if blob.len() < DIGEST_LEN {
            return Err(not_attribution());
        }
        let (root, path) = blob.split_at(DIGEST_LEN);
        Ok(Attribution {
            root: Digest::from_slice(root).map_err(|_| not_attribution())?,
            path: String::from_utf8_lossy(path).into_owned(),
        })
    }

    /// Drain and log out every pooled session.
    pub async fn close(&self) -> StoreResult<()> {
        self.store.pool().close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryMailServer, Verb};
    use crate::pool::DEFAULT_MAILBOX;
    use maildisk_types::HARD_LIMIT;

    fn namespacer(server: &MemoryMailServer) -> Namespacer<MemoryMailServer> {
        server.add_account("user", "pass");
        Namespacer::connect(server.clone(), PoolConfig::new("user", "pass", 4)).unwrap()
    }

    #[tokio::test]
    async fn put_then_get() {
        let server = MemoryMailServer::new();
        let ns = namespacer(&server);
        ns.init().await.unwrap();

        let root = ns.put("/x/y", b"abc").await.unwrap();
        assert_eq!(root, Digest::of(b"abc"));
        assert_eq!(ns.get(root.as_bytes()).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn put_writes_attribution_record() {
        let server = MemoryMailServer::new();
        let ns = namespacer(&server);
        ns.init().await.unwrap();

        let root = ns.put("/a/b", b"payload").await.unwrap();
        let attr = Digest::of(&attribution(&root, "/a/b"));
        assert_eq!(server.records_for(DEFAULT_MAILBOX, Tag::ATTR, &attr), 1);
        assert_eq!(server.records_for(DEFAULT_MAILBOX, Tag::DATA, &root), 1);

        let read = ns.attribution(attr.as_bytes()).await.unwrap();
        assert_eq!(read, Attribution { root, path: "/a/b".into() });
    }

    #[tokio::test]
    async fn short_attribution_blob_is_not_found() {
        let server = MemoryMailServer::new();
        let ns = namespacer(&server);
        ns.init().await.unwrap();

        let stray = ns.store().put(Tag::ATTR, b"too short").await.unwrap();
        let err = ns.attribution(stray.as_bytes()).await.unwrap_err();
        assert!(matches!(err, StoreError::ContentNotFound { digest } if digest == stray));

        let err = ns.attribution(&[0u8; 7]).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidDigestLength { actual: 7 }));
    }

    #[tokio::test]
    async fn root_ignores_path() {
        let server = MemoryMailServer::new();
        let ns = namespacer(&server);
        ns.init().await.unwrap();

        let a = ns.put("/one", b"same").await.unwrap();
        let b = ns.put("/two", b"same").await.unwrap();
        assert_eq!(a, b);
        // One DATA record plus one ATTR record per path.
        assert_eq!(server.message_count(DEFAULT_MAILBOX), 3);
    }

    #[tokio::test]
    async fn attribution_failure_fails_put() {
        let server = MemoryMailServer::new();
        let ns = namespacer(&server);
        ns.init().await.unwrap();

        // Pre-store the payload so the only append left is the attribution.
        ns.store().put(Tag::DATA, b"data").await.unwrap();
        server.fail_next(Verb::Append, "quota exceeded");
        let err = ns.put("/p", b"data").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn large_payload_with_long_path() {
        let server = MemoryMailServer::new();
        let ns = namespacer(&server);
        ns.init().await.unwrap();

        let data: Vec<u8> = (0..4 * HARD_LIMIT).map(|i| (i * 31 % 256) as u8).collect();
        let path = "d/".repeat(HARD_LIMIT / 2);
        let root = ns.put(&path, &data).await.unwrap();
        assert!(ns.get(root.as_bytes()).await.unwrap() == data);

        let attr = ChunkCodec::new(ns.store())
            .split(Tag::ATTR, &attribution(&root, &path))
            .await
            .unwrap();
        assert_eq!(ns.attribution(attr.as_bytes()).await.unwrap().path, path);
    }

    #[tokio::test]
    async fn get_unknown_root_is_not_found() {
        let server = MemoryMailServer::new();
        let ns = namespacer(&server);
        ns.init().await.unwrap();
        let err = ns.get(Digest::of(b"nope").as_bytes()).await.unwrap_err();
        assert!(matches!(err, StoreError::ContentNotFound { .. }));
    }

    #[tokio::test]
    async fn close_rejects_further_work() {
        let server = MemoryMailServer::new();
        let ns = namespacer(&server);
        ns.init().await.unwrap();
        ns.put("/x", b"x").await.unwrap();
        ns.close().await.unwrap();
        assert_eq!(server.live_sessions(), 0);
        assert!(matches!(ns.put("/x", b"x").await.unwrap_err(), StoreError::PoolClosed));
    }
}
