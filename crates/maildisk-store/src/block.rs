//! Single-block content store.
//!
//! Stores and retrieves one block of at most [`HARD_LIMIT`] bytes, keyed by
//! `(tag, SHA-256)`. Writes search before appending so an existing record is
//! never duplicated by a lone writer. Two concurrent writers of the same block
//! can both miss the search and append twice. Reads tolerate that by
//! accepting the first candidate that verifies.

use chrono::Utc;
use maildisk_types::{Digest, Tag, HARD_LIMIT};
use tracing::{debug, warn};

use crate::backend::{Connector, MailSession, SearchCriteria};
use crate::classify::Classify;
use crate::error::{StoreError, StoreResult};
use crate::pool::SessionPool;
use crate::record;

/// Content-addressed store of single blocks on top of a [`SessionPool`].
pub struct BlockStore<C: Connector> {
    pool: SessionPool<C>,
}

impl<C: Connector> BlockStore<C> {
    pub fn new(pool: SessionPool<C>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SessionPool<C> {
        &self.pool
    }

    /// Store `data` under `tag` and return its digest.
    ///
    /// A fresh append and a dedup hit are indistinguishable to the caller.
    pub async fn put(&self, tag: Tag, data: &[u8]) -> StoreResult<Digest> {
        if data.len() > HARD_LIMIT {
            return Err(StoreError::SizeExceeded {
                size: data.len(),
                limit: HARD_LIMIT,
            });
        }
        let digest = Digest::of(data);
        let criteria = SearchCriteria::for_record(tag, &digest);

        let mut session = self.pool.acquire().await?;
        let existing = session.search(&criteria).await.classified()?;
        if !existing.is_empty() {
            debug!(%tag, digest = %digest.short_hex(), "record already stored");
            return Ok(digest);
        }

        let now = Utc::now();
        let message = record::encode(tag, &digest, data, now);
        session
            .append(&self.pool.config().mailbox, now, &message)
            .await
            .classified()?;
        debug!(%tag, digest = %digest.short_hex(), size = data.len(), "appended record");
        Ok(digest)
    }

    /// Fetch the block stored under `(tag, digest)`.
    ///
    /// Every candidate record is decoded and re-hashed; only a candidate
    /// whose content hashes to `digest` is returned.
    pub async fn get(&self, tag: Tag, digest: &[u8]) -> StoreResult<Vec<u8>> {
        let digest = Digest::from_slice(digest).map_err(|_| StoreError::InvalidDigestLength {
            actual: digest.len(),
        })?;
        let criteria = SearchCriteria::for_record(tag, &digest);

        let mut session = self.pool.acquire().await?;
        let candidates = session.search(&criteria).await.classified()?;
        for id in candidates {
            let body = session.fetch_body(id).await.classified()?;
            match record::decode_body(&body) {
                Ok(data) if digest.verifies(&data) => return Ok(data),
                Ok(_) => warn!(id, digest = %digest.short_hex(), "candidate record failed verification"),
                Err(e) => warn!(id, error = %e, "candidate record body is not base64"),
            }
        }
        Err(StoreError::ContentNotFound { digest })
    }
}

impl<C: Connector> std::fmt::Debug for BlockStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore").field("pool", &self.pool).finish()
    }
}
