//! Blocking IMAP client bridged onto the async [`MailSession`] seam.

use std::net::TcpStream;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maildisk_store::{BackendError, BackendResult, Connector, MailSession, MessageId, SearchCriteria};
use native_tls::{TlsConnector, TlsStream};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::address::parse_address;

type TlsClient = imap::Client<TlsStream<TcpStream>>;
type TlsSession = imap::Session<TlsStream<TcpStream>>;

/// Server-visible text of an IMAP failure.
///
/// Tagged `NO`/`BAD` responses yield the server's own wording, which is what
/// the store's error classifier matches against.
pub(crate) fn error_text(err: imap::Error) -> BackendError {
    match err {
        imap::Error::No(text) | imap::Error::Bad(text) => BackendError::new(text),
        other => BackendError::new(other.to_string()),
    }
}

/// Quote a value as an IMAP quoted string.
pub(crate) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Arguments of the `UID SEARCH` command for `criteria`.
pub(crate) fn search_query(criteria: &SearchCriteria) -> String {
    format!(
        "HEADER Subject {} HEADER To {}",
        quote(&criteria.subject),
        quote(&criteria.to)
    )
}

/// Dials an IMAP server over implicit TLS.
#[derive(Clone)]
pub struct ImapConnector {
    host: String,
    port: u16,
    tls: TlsConnector,
}

impl ImapConnector {
    /// Build a connector for `address` (`host[:port]`, port defaulting to 993).
    pub fn new(address: &str) -> BackendResult<Self> {
        let (host, port) = parse_address(address)?;
        let tls = TlsConnector::new().map_err(|e| BackendError::new(e.to_string()))?;
        Ok(Self { host, port, tls })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Debug for ImapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

#[async_trait]
impl Connector for ImapConnector {
    type Session = ImapSession;

    async fn dial(&self) -> BackendResult<ImapSession> {
        let host = self.host.clone();
        let port = self.port;
        let tls = self.tls.clone();
        let client = tokio::task::spawn_blocking(move || {
            imap::connect((host.as_str(), port), &host, &tls).map_err(error_text)
        })
        .await
        .map_err(|e| BackendError::new(format!("dial task failed: {e}")))??;
        debug!(host = %self.host, port = self.port, "connected to IMAP server");
        Ok(ImapSession {
            conn: Some(Conn::Connected(client)),
        })
    }
}

enum Conn {
    Connected(TlsClient),
    Authenticated(TlsSession),
}

impl Conn {
    /// Close a connection whose command outlived its caller.
    fn abandon(self) {
        match self {
            Conn::Authenticated(mut session) => {
                if let Err(e) = session.logout() {
                    debug!(error = %e, "logout of abandoned IMAP session failed");
                }
            }
            Conn::Connected(_) => {}
        }
    }
}

/// Run `op` on a blocking thread and hand `state` back through the returned
/// receiver. If the receiver is gone by the time `op` finishes, `state` is
/// passed to `abandon` on that thread instead.
fn run_blocking<S, T, F, A>(state: S, op: F, abandon: A) -> oneshot::Receiver<(S, T)>
where
    S: Send + 'static,
    T: Send + 'static,
    F: FnOnce(S) -> (S, T) + Send + 'static,
    A: FnOnce(S) + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        if let Err((state, _)) = tx.send(op(state)) {
            abandon(state);
        }
    });
    rx
}

/// One IMAP connection.
///
/// While a command runs the connection lives on a blocking thread. If the
/// awaiting future is dropped before it finishes, the session reports itself
/// unusable and the thread logs the connection out once the command
/// completes. Until then the socket stays open, so a pool that replaces the
/// session may briefly hold one connection more than its capacity.
pub struct ImapSession {
    conn: Option<Conn>,
}

impl ImapSession {
    async fn run<T, F>(&mut self, op: F) -> BackendResult<T>
    where
        F: FnOnce(Conn) -> (Conn, BackendResult<T>) + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| BackendError::new("connection closed"))?;
        let (conn, result) = run_blocking(conn, op, Conn::abandon)
            .await
            .map_err(|_| BackendError::new("IMAP task failed"))?;
        self.conn = Some(conn);
        result
    }

    async fn with_session<T, F>(&mut self, op: F) -> BackendResult<T>
    where
        F: FnOnce(&mut TlsSession) -> imap::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(move |conn| match conn {
            Conn::Authenticated(mut session) => {
                let result = op(&mut session).map_err(error_text);
                (Conn::Authenticated(session), result)
            }
            other => (other, Err(BackendError::new("Not authenticated"))),
        })
        .await
    }
}

#[async_trait]
impl MailSession for ImapSession {
    async fn login(&mut self, username: &str, password: &str) -> BackendResult<()> {
        let username = username.to_string();
        let password = password.to_string();
        self.run(move |conn| match conn {
            Conn::Connected(client) => match client.login(&username, &password) {
                Ok(session) => (Conn::Authenticated(session), Ok(())),
                Err((err, client)) => (Conn::Connected(client), Err(error_text(err))),
            },
            authenticated => (authenticated, Ok(())),
        })
        .await
    }

    async fn select(&mut self, mailbox: &str) -> BackendResult<()> {
        let mailbox = mailbox.to_string();
        self.with_session(move |s| s.select(&mailbox).map(|_| ()))
            .await
    }

    async fn create(&mut self, mailbox: &str) -> BackendResult<()> {
        let mailbox = mailbox.to_string();
        self.with_session(move |s| s.create(&mailbox)).await
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> BackendResult<Vec<MessageId>> {
        let query = search_query(criteria);
        trace!(%query, "UID SEARCH");
        let uids = self.with_session(move |s| s.uid_search(&query)).await?;
        let mut uids: Vec<MessageId> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch_body(&mut self, id: MessageId) -> BackendResult<Vec<u8>> {
        let body = self
            .with_session(move |s| {
                let fetches = s.uid_fetch(id.to_string(), "RFC822.TEXT")?;
                Ok(fetches.iter().find_map(|f| f.text().map(<[u8]>::to_vec)))
            })
            .await?;
        body.ok_or_else(|| BackendError::new(format!("No such message: {id}")))
    }

    async fn append(
        &mut self,
        mailbox: &str,
        _timestamp: DateTime<Utc>,
        message: &[u8],
    ) -> BackendResult<()> {
        // The server stamps the internal date; the record's Date header
        // carries the write time.
        let mailbox = mailbox.to_string();
        let message = message.to_vec();
        self.with_session(move |s| s.append(&mailbox, &message)).await
    }

    async fn noop(&mut self) -> BackendResult<()> {
        self.with_session(|s| s.noop()).await
    }

    async fn logout(&mut self) -> BackendResult<()> {
        match self.conn {
            Some(Conn::Authenticated(_)) => self.with_session(|s| s.logout()).await,
            // Never authenticated: dropping the stream closes it.
            _ => {
                self.conn = None;
                Ok(())
            }
        }
    }

    fn is_usable(&self) -> bool {
        self.conn.is_some()
    }
}
