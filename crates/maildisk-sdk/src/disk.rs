use maildisk_imap::ImapConnector;
use maildisk_index::{JournalPathIndex, PathIndex};
use maildisk_store::{Connector, Namespacer};
use maildisk_types::Digest;
use tracing::{debug, info};

use crate::config::DiskConfig;
use crate::error::{SdkError, SdkResult};

/// A mailbox-backed disk: content in the mail account, paths in a local
/// index.
pub struct MailDisk<C: Connector, I: PathIndex> {
    namespacer: Namespacer<C>,
    index: I,
}

impl MailDisk<ImapConnector, JournalPathIndex> {
    /// Open against the IMAP server and journal file named by `config`.
    pub fn open_imap(config: &DiskConfig) -> SdkResult<Self> {
        let connector = ImapConnector::new(&config.address)?;
        let index = JournalPathIndex::open(&config.index_path())?;
        Self::open(config, connector, index)
    }
}

impl<C: Connector, I: PathIndex> MailDisk<C, I> {
    /// Build the session pool and namespacer. No connection is opened yet.
    pub fn open(config: &DiskConfig, connector: C, index: I) -> SdkResult<Self> {
        let namespacer = Namespacer::connect(connector, config.pool_config())?;
        Ok(Self { namespacer, index })
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn namespacer(&self) -> &Namespacer<C> {
        &self.namespacer
    }

    /// Create the storage mailbox on the server.
    pub async fn init(&self) -> SdkResult<()> {
        self.namespacer.init().await?;
        Ok(())
    }

    /// Store `data` at `remote_path` and point the index at its root digest.
    pub async fn put(&self, remote_path: &str, data: &[u8]) -> SdkResult<Digest> {
        let root = self.namespacer.put(remote_path, data).await?;
        self.index.set(remote_path, root)?;
        info!(path = remote_path, digest = %root.short_hex(), size = data.len(), "put");
        Ok(root)
    }

    /// Root digest currently recorded for `remote_path`.
    pub fn resolve(&self, remote_path: &str) -> SdkResult<Digest> {
        self.index
            .get(remote_path)?
            .ok_or_else(|| SdkError::PathNotFound(remote_path.to_string()))
    }

    pub async fn get(&self, remote_path: &str) -> SdkResult<Vec<u8>> {
        let root = self.resolve(remote_path)?;
        debug!(path = remote_path, digest = %root.short_hex(), "resolved path");
        self.get_digest(root.as_bytes()).await
    }

    /// Read content by root digest, bypassing the index.
    pub async fn get_digest(&self, digest: &[u8]) -> SdkResult<Vec<u8>> {
        Ok(self.namespacer.get(digest).await?)
    }

    /// Indexed paths starting with `prefix`, in path order.
    pub fn list(&self, prefix: &str) -> SdkResult<Vec<(String, Digest)>> {
        Ok(self.index.iterate_prefix(prefix)?)
    }

    /// Log out every pooled session and compact the path index.
    ///
    /// The index is compacted even when closing the pool fails; the pool
    /// error is reported first.
    pub async fn close(&self) -> SdkResult<()> {
        let closed = self.namespacer.close().await;
        let compacted = self.index.compact();
        closed?;
        let kept = compacted?;
        debug!(entries = kept, "path index compacted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maildisk_index::InMemoryPathIndex;
    use maildisk_store::{MemoryMailServer, StoreError};
    use maildisk_types::HARD_LIMIT;

    fn config() -> DiskConfig {
        DiskConfig::new("memory", "user", "pass")
    }

    fn disk(server: &MemoryMailServer) -> MailDisk<MemoryMailServer, InMemoryPathIndex> {
        server.add_account("user", "pass");
        MailDisk::open(&config(), server.clone(), InMemoryPathIndex::new()).unwrap()
    }

    #[tokio::test]
    async fn put_get_list() {
        let server = MemoryMailServer::new();
        let disk = disk(&server);
        disk.init().await.unwrap();

        let big: Vec<u8> = (0..2 * HARD_LIMIT + 17).map(|i| (i % 256) as u8).collect();
        let a = disk.put("/docs/a.txt", b"hello").await.unwrap();
        let b = disk.put("/docs/b.bin", &big).await.unwrap();
        disk.put("/music/c.mp3", b"la").await.unwrap();

        assert_eq!(disk.get("/docs/a.txt").await.unwrap(), b"hello");
        assert!(disk.get("/docs/b.bin").await.unwrap() == big);
        assert_eq!(disk.get_digest(a.as_bytes()).await.unwrap(), b"hello");

        let listed = disk.list("/docs/").unwrap();
        assert_eq!(
            listed,
            vec![("/docs/a.txt".to_string(), a), ("/docs/b.bin".to_string(), b)]
        );
        assert_eq!(disk.list("").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn overwrite_repoints_path() {
        let server = MemoryMailServer::new();
        let disk = disk(&server);
        disk.init().await.unwrap();

        disk.put("/f", b"v1").await.unwrap();
        let v2 = disk.put("/f", b"v2").await.unwrap();
        assert_eq!(disk.resolve("/f").unwrap(), v2);
        assert_eq!(disk.get("/f").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn unknown_path() {
        let server = MemoryMailServer::new();
        let disk = disk(&server);
        let err = disk.get("/nope").await.unwrap_err();
        assert!(matches!(err, SdkError::PathNotFound(ref p) if p == "/nope"));
        // Index miss never touches the backend.
        assert_eq!(server.dial_count(), 0);
    }

    #[tokio::test]
    async fn failed_put_leaves_index_untouched() {
        let server = MemoryMailServer::new();
        let disk = disk(&server);
        // No init: the storage mailbox does not exist.
        let err = disk.put("/f", b"data").await.unwrap_err();
        assert!(matches!(err, SdkError::Store(StoreError::Backend(_))));
        assert!(disk.index().get("/f").unwrap().is_none());
    }

    #[tokio::test]
    async fn init_twice_reports_existing_mailbox() {
        let server = MemoryMailServer::new();
        let disk = disk(&server);
        disk.init().await.unwrap();
        let err = disk.init().await.unwrap_err();
        assert!(matches!(err, SdkError::Store(ref e) if e.is_informational()));
    }

    #[test]
    fn zero_connections_is_rejected() {
        let mut config = config();
        config.max_connections = 0;
        let result = MailDisk::open(&config, MemoryMailServer::new(), InMemoryPathIndex::new());
        assert!(matches!(result, Err(SdkError::Store(StoreError::MaxConnIsZero))));
    }

    #[tokio::test]
    async fn journal_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.journal");
        let server = MemoryMailServer::new();
        server.add_account("user", "pass");

        let root = {
            let index = JournalPathIndex::open(&path).unwrap();
            let disk = MailDisk::open(&config(), server.clone(), index).unwrap();
            disk.init().await.unwrap();
            let root = disk.put("/kept", b"persisted").await.unwrap();
            disk.close().await.unwrap();
            root
        };

        let index = JournalPathIndex::open(&path).unwrap();
        let disk = MailDisk::open(&config(), server.clone(), index).unwrap();
        assert_eq!(disk.resolve("/kept").unwrap(), root);
        assert_eq!(disk.get("/kept").await.unwrap(), b"persisted");
    }

    #[tokio::test]
    async fn close_compacts_the_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.journal");
        let server = MemoryMailServer::new();
        server.add_account("user", "pass");

        let index = JournalPathIndex::open(&path).unwrap();
        let disk = MailDisk::open(&config(), server.clone(), index).unwrap();
        disk.init().await.unwrap();
        for round in 0..5u8 {
            disk.put("/rewritten", &[round]).await.unwrap();
        }
        let last = disk.put("/rewritten", b"final").await.unwrap();
        let grown = std::fs::metadata(&path).unwrap().len();

        disk.close().await.unwrap();
        let compacted = std::fs::metadata(&path).unwrap().len();
        assert!(compacted * 6 == grown, "{compacted} vs {grown}");

        let reopened = JournalPathIndex::open(&path).unwrap();
        assert_eq!(reopened.get("/rewritten").unwrap(), Some(last));
    }

    #[tokio::test]
    async fn close_reports_index_failures() {
        let dir = tempfile::tempdir().unwrap();
        let journal_dir = dir.path().join("index");
        let server = MemoryMailServer::new();
        server.add_account("user", "pass");

        let index = JournalPathIndex::open(&journal_dir.join("index.journal")).unwrap();
        let disk = MailDisk::open(&config(), server.clone(), index).unwrap();
        std::fs::remove_dir_all(&journal_dir).unwrap();

        let err = disk.close().await.unwrap_err();
        assert!(matches!(err, SdkError::Index(_)));
    }
}
