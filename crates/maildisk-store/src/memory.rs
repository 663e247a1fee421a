//! In-process mail backend.
//!
//! [`MemoryMailServer`] implements [`Connector`] with the same observable
//! behavior as a real mailbox account: accounts and passwords, named
//! mailboxes, substring header search, body fetch, and append. Failure texts
//! match what a real server reports so classification can be exercised end
//! to end. It also carries instrumentation for tests (dial counts, live
//! session high-water mark, one-shot failure injection).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maildisk_types::{Digest, Tag};

use crate::backend::{Connector, MailSession, MessageId, SearchCriteria};
use crate::error::{BackendError, BackendResult};

/// Backend verbs that can be made to fail on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Dial,
    Login,
    Select,
    Create,
    Search,
    Fetch,
    Append,
    Noop,
    Logout,
}

#[derive(Clone, Debug)]
struct StoredMessage {
    uid: MessageId,
    internal_date: DateTime<Utc>,
    raw: Vec<u8>,
}

impl StoredMessage {
    fn header(&self, name: &str) -> Option<&str> {
        let text = std::str::from_utf8(self.header_block()).ok()?;
        text.split("\r\n").find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    fn header_block(&self) -> &[u8] {
        match find_separator(&self.raw) {
            Some(pos) => &self.raw[..pos],
            None => &self.raw,
        }
    }

    fn body(&self) -> &[u8] {
        match find_separator(&self.raw) {
            Some(pos) => &self.raw[pos + 4..],
            None => &[],
        }
    }
}

fn find_separator(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

fn header_matches(message: &StoredMessage, name: &str, needle: &str) -> bool {
    message
        .header(name)
        .map(|value| value.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
        .unwrap_or(false)
}

#[derive(Default)]
struct ServerState {
    accounts: HashMap<String, String>,
    mailboxes: HashMap<String, Vec<StoredMessage>>,
    next_uid: MessageId,
    /// Bumped to invalidate every session opened before it.
    epoch: u64,
    dials: usize,
    live_sessions: usize,
    max_live_sessions: usize,
    failures: HashMap<Verb, VecDeque<String>>,
}

impl ServerState {
    fn take_failure(&mut self, verb: Verb) -> BackendResult<()> {
        match self.failures.get_mut(&verb).and_then(VecDeque::pop_front) {
            Some(message) => Err(BackendError::new(message)),
            None => Ok(()),
        }
    }
}

/// Shared handle to an in-memory mail account server.
#[derive(Clone, Default)]
pub struct MemoryMailServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryMailServer {
    /// Create a server with no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a server with a single account.
    pub fn with_account(username: &str, password: &str) -> Self {
        let server = Self::new();
        server.add_account(username, password);
        server
    }

    pub fn add_account(&self, username: &str, password: &str) {
        self.lock()
            .accounts
            .insert(username.to_string(), password.to_string());
    }

    /// Create a mailbox directly, bypassing any session.
    pub fn create_mailbox(&self, name: &str) {
        self.lock().mailboxes.entry(name.to_string()).or_default();
    }

    pub fn has_mailbox(&self, name: &str) -> bool {
        self.lock().mailboxes.contains_key(name)
    }

    /// Make the next call of `verb` fail with `message`. Failures queue up.
    pub fn fail_next(&self, verb: Verb, message: &str) {
        self.lock()
            .failures
            .entry(verb)
            .or_default()
            .push_back(message.to_string());
    }

    /// Drop every open connection; sessions opened earlier fail from now on.
    pub fn disconnect_all(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.live_sessions = 0;
    }

    /// Store a raw message, as if appended by some other client.
    pub fn inject_raw(&self, mailbox: &str, raw: &[u8]) -> MessageId {
        let mut state = self.lock();
        state.next_uid += 1;
        let uid = state.next_uid;
        state
            .mailboxes
            .entry(mailbox.to_string())
            .or_default()
            .push(StoredMessage {
                uid,
                internal_date: Utc::now(),
                raw: raw.to_vec(),
            });
        uid
    }

    /// Number of messages whose headers exactly name `(tag, digest)`.
    pub fn records_for(&self, mailbox: &str, tag: Tag, digest: &Digest) -> usize {
        let subject = digest.to_hex();
        let to = tag.to_hex();
        self.lock()
            .mailboxes
            .get(mailbox)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| {
                        m.header("Subject") == Some(subject.as_str())
                            && m.header("To") == Some(to.as_str())
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn message_count(&self, mailbox: &str) -> usize {
        self.lock().mailboxes.get(mailbox).map(Vec::len).unwrap_or(0)
    }

    /// Bodies of every message in a mailbox, in append order.
    pub fn bodies(&self, mailbox: &str) -> Vec<Vec<u8>> {
        self.lock()
            .mailboxes
            .get(mailbox)
            .map(|msgs| msgs.iter().map(|m| m.body().to_vec()).collect())
            .unwrap_or_default()
    }

    /// Internal dates of every message in a mailbox, in append order.
    pub fn internal_dates(&self, mailbox: &str) -> Vec<DateTime<Utc>> {
        self.lock()
            .mailboxes
            .get(mailbox)
            .map(|msgs| msgs.iter().map(|m| m.internal_date).collect())
            .unwrap_or_default()
    }

    /// Total successful dials so far.
    pub fn dial_count(&self) -> usize {
        self.lock().dials
    }

    /// Sessions currently connected.
    pub fn live_sessions(&self) -> usize {
        self.lock().live_sessions
    }

    /// Highest number of simultaneously connected sessions observed.
    pub fn max_live_sessions(&self) -> usize {
        self.lock().max_live_sessions
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for MemoryMailServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryMailServer")
            .field("mailboxes", &state.mailboxes.len())
            .field("live_sessions", &state.live_sessions)
            .finish()
    }
}

#[async_trait]
impl Connector for MemoryMailServer {
    type Session = MemorySession;

    async fn dial(&self) -> BackendResult<MemorySession> {
        let mut state = self.lock();
        state.take_failure(Verb::Dial)?;
        state.dials += 1;
        state.live_sessions += 1;
        state.max_live_sessions = state.max_live_sessions.max(state.live_sessions);
        Ok(MemorySession {
            server: self.clone(),
            epoch: state.epoch,
            user: None,
            selected: None,
            open: true,
        })
    }
}

/// A session against a [`MemoryMailServer`].
pub struct MemorySession {
    server: MemoryMailServer,
    epoch: u64,
    user: Option<String>,
    selected: Option<String>,
    open: bool,
}

impl MemorySession {
    /// Lock server state, failing if this connection is gone.
    fn connected(&self, verb: Verb) -> BackendResult<MutexGuard<'_, ServerState>> {
        let mut state = self.server.lock();
        if !self.open || state.epoch != self.epoch {
            return Err(BackendError::new("connection closed"));
        }
        state.take_failure(verb)?;
        Ok(state)
    }

    fn require_login(&self) -> BackendResult<()> {
        match self.user {
            Some(_) => Ok(()),
            None => Err(BackendError::new("Not authenticated")),
        }
    }

    fn require_selected(&self) -> BackendResult<&str> {
        self.require_login()?;
        self.selected
            .as_deref()
            .ok_or_else(|| BackendError::new("No mailbox selected"))
    }
}

#[async_trait]
impl MailSession for MemorySession {
    async fn login(&mut self, username: &str, password: &str) -> BackendResult<()> {
        let state = self.connected(Verb::Login)?;
        if state.accounts.get(username).map(String::as_str) != Some(password) {
            return Err(BackendError::new("LOGIN failed"));
        }
        drop(state);
        self.user = Some(username.to_string());
        Ok(())
    }

    async fn select(&mut self, mailbox: &str) -> BackendResult<()> {
        self.require_login()?;
        let state = self.connected(Verb::Select)?;
        if !state.mailboxes.contains_key(mailbox) {
            return Err(BackendError::new(format!("Mailbox doesn't exist: {mailbox}")));
        }
        drop(state);
        self.selected = Some(mailbox.to_string());
        Ok(())
    }

    async fn create(&mut self, mailbox: &str) -> BackendResult<()> {
        self.require_login()?;
        let mut state = self.connected(Verb::Create)?;
        if state.mailboxes.contains_key(mailbox) {
            return Err(BackendError::new("CREATE failed: mailbox already exists"));
        }
        state.mailboxes.insert(mailbox.to_string(), Vec::new());
        Ok(())
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> BackendResult<Vec<MessageId>> {
        let mailbox = self.require_selected()?.to_string();
        let state = self.connected(Verb::Search)?;
        let ids = state
            .mailboxes
            .get(&mailbox)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| {
                        header_matches(m, "Subject", &criteria.subject)
                            && header_matches(m, "To", &criteria.to)
                    })
                    .map(|m| m.uid)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn fetch_body(&mut self, id: MessageId) -> BackendResult<Vec<u8>> {
        let mailbox = self.require_selected()?.to_string();
        let state = self.connected(Verb::Fetch)?;
        state
            .mailboxes
            .get(&mailbox)
            .and_then(|msgs| msgs.iter().find(|m| m.uid == id))
            .map(|m| m.body().to_vec())
            .ok_or_else(|| BackendError::new(format!("No such message: {id}")))
    }

    async fn append(
        &mut self,
        mailbox: &str,
        timestamp: DateTime<Utc>,
        message: &[u8],
    ) -> BackendResult<()> {
        self.require_login()?;
        let mut state = self.connected(Verb::Append)?;
        if !state.mailboxes.contains_key(mailbox) {
            return Err(BackendError::new("[TRYCREATE] Mailbox doesn't exist"));
        }
        state.next_uid += 1;
        let uid = state.next_uid;
        if let Some(msgs) = state.mailboxes.get_mut(mailbox) {
            msgs.push(StoredMessage {
                uid,
                internal_date: timestamp,
                raw: message.to_vec(),
            });
        }
        Ok(())
    }

    async fn noop(&mut self) -> BackendResult<()> {
        self.connected(Verb::Noop).map(drop)
    }

    async fn logout(&mut self) -> BackendResult<()> {
        let mut state = self.connected(Verb::Logout)?;
        state.live_sessions = state.live_sessions.saturating_sub(1);
        drop(state);
        self.open = false;
        Ok(())
    }

    fn is_usable(&self) -> bool {
        self.open && self.server.lock().epoch == self.epoch
    }
}
