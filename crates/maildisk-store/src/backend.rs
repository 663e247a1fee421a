//! Capabilities the store requires from a mail backend.
//!
//! A [`Connector`] dials new sessions; a [`MailSession`] speaks the handful of
//! mailbox verbs the block store needs. Implementations report failures as
//! [`BackendError`]s carrying the backend's raw text and leave their
//! interpretation to [`crate::classify`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maildisk_types::{Digest, Tag};

use crate::error::BackendResult;

/// Backend-assigned identifier of a stored message (an IMAP UID).
pub type MessageId = u32;

/// Header criteria for locating the records of one `(tag, digest)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Expected `Subject` header: hex of the digest.
    pub subject: String,
    /// Expected `To` header: hex of the tag.
    pub to: String,
}

impl SearchCriteria {
    pub fn for_record(tag: Tag, digest: &Digest) -> Self {
        Self {
            subject: digest.to_hex(),
            to: tag.to_hex(),
        }
    }
}

/// Opens new, unauthenticated sessions against a fixed backend address.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: MailSession;

    async fn dial(&self) -> BackendResult<Self::Session>;
}

/// One connection to the mail backend.
#[async_trait]
pub trait MailSession: Send {
    async fn login(&mut self, username: &str, password: &str) -> BackendResult<()>;

    async fn select(&mut self, mailbox: &str) -> BackendResult<()>;

    async fn create(&mut self, mailbox: &str) -> BackendResult<()>;

    /// Messages in the selected mailbox whose headers match `criteria`.
    ///
    /// Matching may be looser than exact equality (IMAP header search is a
    /// substring match), so callers must verify what they fetch.
    async fn search(&mut self, criteria: &SearchCriteria) -> BackendResult<Vec<MessageId>>;

    /// Raw body text of a message, without its headers.
    async fn fetch_body(&mut self, id: MessageId) -> BackendResult<Vec<u8>>;

    async fn append(
        &mut self,
        mailbox: &str,
        timestamp: DateTime<Utc>,
        message: &[u8],
    ) -> BackendResult<()>;

    /// Cheap round trip used to check that the session is still alive.
    async fn noop(&mut self) -> BackendResult<()>;

    async fn logout(&mut self) -> BackendResult<()>;

    /// Whether the session can still carry commands. An unusable session is
    /// discarded instead of being returned to the pool.
    fn is_usable(&self) -> bool {
        true
    }
}
