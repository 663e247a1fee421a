//! Bounded pool of authenticated backend sessions.
//!
//! The pool is a fixed-capacity queue pre-seeded with `max_connections`
//! placeholders and guarded by a semaphore with the same number of permits.
//! Acquiring takes a permit and the front slot; a placeholder is turned into
//! a live session (dial, login, select) on first use. The returned
//! [`PooledSession`] puts the session back when dropped, whatever the outcome
//! of the work done with it.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::backend::{Connector, MailSession};
use crate::classify::Classify;
use crate::error::{StoreError, StoreResult};

/// Mailbox that holds every record unless configured otherwise.
pub const DEFAULT_MAILBOX: &str = "MDDATA";

/// Account credentials for the backend.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session pool settings.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub credentials: Credentials,
    /// Storage mailbox selected by every pooled session.
    pub mailbox: String,
    /// Upper bound on concurrently open sessions. Must be non-zero.
    pub max_connections: usize,
    /// Check idle sessions with a no-op before handing them out and replace
    /// the ones that no longer answer.
    pub validate_on_acquire: bool,
}

impl PoolConfig {
    pub fn new(username: &str, password: &str, max_connections: usize) -> Self {
        Self {
            credentials: Credentials {
                username: username.to_string(),
                password: password.to_string(),
            },
            mailbox: DEFAULT_MAILBOX.to_string(),
            max_connections,
            validate_on_acquire: false,
        }
    }

    pub fn with_mailbox(mut self, mailbox: &str) -> Self {
        self.mailbox = mailbox.to_string();
        self
    }

    pub fn with_validation(mut self, validate_on_acquire: bool) -> Self {
        self.validate_on_acquire = validate_on_acquire;
        self
    }
}

type Slots<S> = Arc<Mutex<VecDeque<Option<S>>>>;

fn lock<S>(slots: &Mutex<VecDeque<Option<S>>>) -> MutexGuard<'_, VecDeque<Option<S>>> {
    slots.lock().unwrap_or_else(|e| e.into_inner())
}

/// Bounded, lazily connecting pool of backend sessions.
pub struct SessionPool<C: Connector> {
    connector: C,
    config: PoolConfig,
    slots: Slots<C::Session>,
    permits: Arc<Semaphore>,
}

impl<C: Connector> SessionPool<C> {
    /// Create a pool of `config.max_connections` placeholders. No connection
    /// is opened until the first [`acquire`](Self::acquire).
    pub fn new(connector: C, config: PoolConfig) -> StoreResult<Self> {
        if config.max_connections == 0 {
            return Err(StoreError::MaxConnIsZero);
        }
        let slots = (0..config.max_connections).map(|_| None).collect();
        let permits = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            connector,
            config,
            slots: Arc::new(Mutex::new(slots)),
            permits,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.max_connections
    }

    /// Initialized sessions currently sitting in the pool.
    pub fn idle_sessions(&self) -> usize {
        lock(&self.slots).iter().filter(|s| s.is_some()).count()
    }

    /// Wait for a free slot and return its session, connecting it first if
    /// the slot still holds a placeholder.
    pub async fn acquire(&self) -> StoreResult<PooledSession<C::Session>> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolClosed)?;

        let slot = lock(&self.slots).pop_front().flatten();
        let session = match slot {
            Some(session) => self.revalidate(session).await,
            None => self.establish().await,
        };

        match session {
            Ok(session) => Ok(PooledSession {
                session: Some(session),
                slots: Arc::clone(&self.slots),
                _permit: permit,
            }),
            Err(e) => {
                // Keep capacity intact: the slot goes back as a placeholder.
                lock(&self.slots).push_back(None);
                Err(e)
            }
        }
    }

    /// Bootstrap the storage mailbox on a dedicated, unpooled session.
    ///
    /// Re-running against an account that already has the mailbox fails with
    /// [`StoreError::MailboxAlreadyExists`], which callers may treat as
    /// success. Unclassified failures become [`StoreError::InitFailed`].
    pub async fn init(&self) -> StoreResult<()> {
        let creds = &self.config.credentials;
        let mut session = self.connector.dial().await.classified_init()?;
        session
            .login(&creds.username, &creds.password)
            .await
            .classified_init()?;
        let created = session.create(&self.config.mailbox).await.classified_init();
        if let Err(e) = session.logout().await {
            debug!(error = %e, "logout after init failed");
        }

        match &created {
            Ok(()) => info!(mailbox = %self.config.mailbox, "created storage mailbox"),
            Err(StoreError::MailboxAlreadyExists) => {
                info!(mailbox = %self.config.mailbox, "storage mailbox already exists")
            }
            Err(_) => {}
        }
        created
    }

    /// Wait for every outstanding session to come back, log all of them out,
    /// and refuse further acquisitions.
    pub async fn close(&self) -> StoreResult<()> {
        if self.permits.is_closed() {
            return Ok(());
        }
        let all = u32::try_from(self.config.max_connections).unwrap_or(u32::MAX);
        let _drained = self
            .permits
            .acquire_many(all)
            .await
            .map_err(|_| StoreError::PoolClosed)?;

        let sessions: Vec<C::Session> = lock(&self.slots)
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        let count = sessions.len();
        for mut session in sessions {
            if let Err(e) = session.logout().await {
                warn!(error = %e, "logout failed while closing pool");
            }
        }
        self.permits.close();
        debug!(sessions = count, "session pool closed");
        Ok(())
    }

    async fn revalidate(&self, mut session: C::Session) -> StoreResult<C::Session> {
        if !self.config.validate_on_acquire {
            return Ok(session);
        }
        match session.noop().await {
            Ok(()) => Ok(session),
            Err(e) => {
                warn!(error = %e, "pooled session is dead, replacing it");
                let _ = session.logout().await;
                self.establish().await
            }
        }
    }

    async fn establish(&self) -> StoreResult<C::Session> {
        let creds = &self.config.credentials;
        let mut session = self.connector.dial().await.classified()?;
        session
            .login(&creds.username, &creds.password)
            .await
            .classified()?;
        session.select(&self.config.mailbox).await.classified()?;
        debug!(mailbox = %self.config.mailbox, "established backend session");
        Ok(session)
    }
}

impl<C: Connector> std::fmt::Debug for SessionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("capacity", &self.capacity())
            .field("available", &self.permits.available_permits())
            .field("idle_sessions", &self.idle_sessions())
            .finish()
    }
}

/// A session checked out of a [`SessionPool`].
///
/// Dropping it returns the session to the pool and frees the slot.
pub struct PooledSession<S: MailSession> {
    session: Option<S>,
    slots: Slots<S>,
    _permit: OwnedSemaphorePermit,
}

impl<S: MailSession> Deref for PooledSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session.as_ref().expect("session present until drop")
    }
}

impl<S: MailSession> DerefMut for PooledSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().expect("session present until drop")
    }
}

impl<S: MailSession> Drop for PooledSession<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            // A session broken mid-command goes back as a placeholder.
            let slot = session.is_usable().then_some(session);
            lock(&self.slots).push_back(slot);
        }
    }
}
