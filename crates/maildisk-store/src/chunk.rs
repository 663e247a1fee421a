//! Splitting arbitrary payloads into a binary tree of blocks, and joining
//! them back.
//!
//! Payloads shorter than [`HARD_LIMIT`] become a single leaf. Anything larger
//! keeps its first [`SOFT_LIMIT`] bytes inline in an internal node and
//! recurses on the remainder, cut at [`node::boundary`]. Both subtrees are
//! written (or read) concurrently; the first failure drops the sibling.

use std::future::Future;
use std::pin::Pin;

use maildisk_types::{Digest, Tag, HARD_LIMIT, SOFT_LIMIT};
use tracing::trace;

use crate::backend::Connector;
use crate::block::BlockStore;
use crate::error::{StoreError, StoreResult};
use crate::node::{self, InternalNode};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Stateless tree codec over a [`BlockStore`].
pub struct ChunkCodec<'s, C: Connector> {
    store: &'s BlockStore<C>,
}

impl<'s, C: Connector> ChunkCodec<'s, C> {
    pub fn new(store: &'s BlockStore<C>) -> Self {
        Self { store }
    }

    /// Store `data` under `tag` and return the root digest of its tree.
    pub fn split<'a>(&'a self, tag: Tag, data: &'a [u8]) -> BoxFuture<'a, Digest> {
        Box::pin(async move {
            if data.len() < HARD_LIMIT {
                return self.store.put(tag, data).await;
            }

            let boundary = node::boundary(data.len());
            let (this, rest) = data.split_at(SOFT_LIMIT);
            let (left, right) = rest.split_at(boundary - SOFT_LIMIT);
            trace!(len = data.len(), left = left.len(), right = right.len(), "splitting");

            let (left, right) = tokio::try_join!(self.split(tag, left), self.split(tag, right))?;
            let block = node::encode_internal(this, &left, &right);
            self.store.put(tag, &block).await
        })
    }

    /// Reassemble the payload whose tree is rooted at `digest`.
    pub fn join<'a>(&'a self, tag: Tag, digest: &'a [u8]) -> BoxFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let block = self.store.get(tag, digest).await?;
            if block.len() < HARD_LIMIT {
                return Ok(block);
            }
            let Some(InternalNode { this, left, right }) = InternalNode::decode(&block) else {
                return Err(StoreError::SizeExceeded {
                    size: block.len(),
                    limit: HARD_LIMIT,
                });
            };

            let (left, right) = tokio::try_join!(
                self.join(tag, left.as_bytes()),
                self.join(tag, right.as_bytes())
            )?;
            let mut data = Vec::with_capacity(this.len() + left.len() + right.len());
            data.extend_from_slice(this);
            data.extend_from_slice(&left);
            data.extend_from_slice(&right);
            Ok(data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryMailServer, Verb};
    use crate::pool::{PoolConfig, SessionPool, DEFAULT_MAILBOX};
    use crate::record;
    use proptest::prelude::*;

    fn store(server: &MemoryMailServer, n: usize) -> BlockStore<MemoryMailServer> {
        server.add_account("user", "pass");
        server.create_mailbox(DEFAULT_MAILBOX);
        let pool = SessionPool::new(server.clone(), PoolConfig::new("user", "pass", n)).unwrap();
        BlockStore::new(pool)
    }

    fn payload(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8 ^ seed).collect()
    }

    #[tokio::test]
    async fn round_trips_around_the_limits() {
        let server = MemoryMailServer::new();
        let store = store(&server, 4);
        let codec = ChunkCodec::new(&store);
        let h = HARD_LIMIT;

        for len in [0, 1, h - 65, h - 64, h - 1, h, h + 1, 10 * h] {
            let data = payload(len, 0x5a);
            let root = codec.split(Tag::DATA, &data).await.unwrap();
            let back = codec.join(Tag::DATA, root.as_bytes()).await.unwrap();
            assert_eq!(back.len(), len, "length mismatch at {len}");
            assert!(back == data, "content mismatch at {len}");
        }
    }

    #[tokio::test]
    async fn small_payload_is_a_single_leaf() {
        let server = MemoryMailServer::new();
        let store = store(&server, 2);
        let codec = ChunkCodec::new(&store);
        let root = codec.split(Tag::DATA, b"abc").await.unwrap();
        assert_eq!(root, Digest::of(b"abc"));
        assert_eq!(server.message_count(DEFAULT_MAILBOX), 1);
    }

    #[tokio::test]
    async fn exactly_one_hard_block_gets_an_empty_left_child() {
        let server = MemoryMailServer::new();
        let store = store(&server, 2);
        let codec = ChunkCodec::new(&store);
        let data = payload(HARD_LIMIT, 1);

        let root = codec.split(Tag::DATA, &data).await.unwrap();
        let block = store.get(Tag::DATA, root.as_bytes()).await.unwrap();
        let node = InternalNode::decode(&block).unwrap();
        assert_eq!(node.this, &data[..SOFT_LIMIT]);
        assert_eq!(node.left, Digest::of(b""));
        assert_eq!(node.right, Digest::of(&data[SOFT_LIMIT..]));
        assert_eq!(server.message_count(DEFAULT_MAILBOX), 3);
    }

    #[tokio::test]
    async fn three_hard_blocks_build_one_internal_root() {
        let server = MemoryMailServer::new();
        let store = store(&server, 4);
        let codec = ChunkCodec::new(&store);
        let data = payload(3 * HARD_LIMIT, 9);

        let root = codec.split(Tag::DATA, &data).await.unwrap();
        let block = store.get(Tag::DATA, root.as_bytes()).await.unwrap();
        let node = InternalNode::decode(&block).expect("root is internal");

        let left = store.get(Tag::DATA, node.left.as_bytes()).await.unwrap();
        assert_eq!(left.len(), SOFT_LIMIT);
        assert_eq!(left, &data[SOFT_LIMIT..2 * SOFT_LIMIT]);

        let right = store.get(Tag::DATA, node.right.as_bytes()).await.unwrap();
        assert_eq!(right.len(), HARD_LIMIT);

        let back = codec.join(Tag::DATA, root.as_bytes()).await.unwrap();
        assert!(back == data);
    }

    #[tokio::test]
    async fn every_stored_block_respects_the_hard_limit() {
        let server = MemoryMailServer::new();
        let store = store(&server, 4);
        let codec = ChunkCodec::new(&store);
        codec.split(Tag::DATA, &payload(7 * HARD_LIMIT + 123, 3)).await.unwrap();

        for body in server.bodies(DEFAULT_MAILBOX) {
            let block = record::decode_body(&body).unwrap();
            assert!(block.len() <= HARD_LIMIT);
        }
    }

    #[tokio::test]
    async fn split_is_idempotent() {
        let server = MemoryMailServer::new();
        let store = store(&server, 4);
        let codec = ChunkCodec::new(&store);
        let data = payload(5 * HARD_LIMIT, 7);

        let first = codec.split(Tag::DATA, &data).await.unwrap();
        let records = server.message_count(DEFAULT_MAILBOX);
        let second = codec.split(Tag::DATA, &data).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(server.message_count(DEFAULT_MAILBOX), records);
    }

    #[tokio::test]
    async fn single_connection_does_not_deadlock() {
        let server = MemoryMailServer::new();
        let store = store(&server, 1);
        let codec = ChunkCodec::new(&store);
        let data = payload(6 * HARD_LIMIT, 2);

        let root = codec.split(Tag::DATA, &data).await.unwrap();
        assert!(codec.join(Tag::DATA, root.as_bytes()).await.unwrap() == data);
        assert_eq!(server.max_live_sessions(), 1);
    }

    #[tokio::test]
    async fn connections_stay_within_capacity() {
        let server = MemoryMailServer::new();
        let store = store(&server, 3);
        let codec = ChunkCodec::new(&store);
        codec.split(Tag::DATA, &payload(12 * HARD_LIMIT, 4)).await.unwrap();
        assert!(server.max_live_sessions() <= 3);
    }

    #[tokio::test]
    async fn failing_subtree_fails_the_whole_split() {
        let server = MemoryMailServer::new();
        let store = store(&server, 2);
        let codec = ChunkCodec::new(&store);
        let data = payload(3 * HARD_LIMIT, 5);

        server.fail_next(Verb::Append, "quota exceeded");
        let err = codec.split(Tag::DATA, &data).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(ref raw) if raw.message() == "quota exceeded"));

        // Capacity is intact and a retry fills in whatever is missing.
        assert!(store.pool().idle_sessions() <= 2);
        let root = codec.split(Tag::DATA, &data).await.unwrap();
        assert!(codec.join(Tag::DATA, root.as_bytes()).await.unwrap() == data);
    }

    #[tokio::test]
    async fn missing_child_surfaces_not_found() {
        let server = MemoryMailServer::new();
        let store = store(&server, 2);
        let codec = ChunkCodec::new(&store);

        let ghost = Digest::of(b"ghost");
        let block = node::encode_internal(&vec![0u8; SOFT_LIMIT], &ghost, &Digest::of(b""));
        let root = store.put(Tag::DATA, &block).await.unwrap();
        store.put(Tag::DATA, b"").await.unwrap();

        let err = codec.join(Tag::DATA, root.as_bytes()).await.unwrap_err();
        assert!(matches!(err, StoreError::ContentNotFound { digest } if digest == ghost));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn arbitrary_lengths_round_trip(len in 0usize..3 * HARD_LIMIT, seed in any::<u8>()) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let back = rt.block_on(async {
                let server = MemoryMailServer::new();
                let store = store(&server, 3);
                let codec = ChunkCodec::new(&store);
                let data = payload(len, seed);
                let root = codec.split(Tag::DATA, &data).await.unwrap();
                (data, codec.join(Tag::DATA, root.as_bytes()).await.unwrap())
            });
            prop_assert!(back.0 == back.1);
        }
    }
}
