//! IMAP backend for maildisk.
//!
//! [`ImapConnector`] dials an IMAP server over implicit TLS and hands out
//! [`ImapSession`]s implementing the store's [`MailSession`] seam. The
//! underlying client is blocking; every command runs on tokio's blocking
//! thread pool.
//!
//! [`MailSession`]: maildisk_store::MailSession

pub mod address;
pub mod session;

pub use address::{parse_address, DEFAULT_IMAPS_PORT};
pub use session::{ImapConnector, ImapSession};
