use std::path::{Path, PathBuf};

use maildisk_store::{PoolConfig, DEFAULT_MAILBOX};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Connection and storage settings, usually read from `~/.maildisk.toml`.
///
/// ```toml
/// address = "imap.example.com:993"
/// username = "me@example.com"
/// password = "secret"
/// max_connections = 8
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskConfig {
    /// `host:port` of the IMAP server. The port defaults to 993.
    pub address: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    /// Where the path index journal lives. `~/` is expanded.
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    /// Check pooled sessions with NOOP before handing them out.
    #[serde(default)]
    pub validate_on_acquire: bool,
}

fn default_max_connections() -> usize {
    4
}

fn default_mailbox() -> String {
    DEFAULT_MAILBOX.to_string()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

impl DiskConfig {
    pub fn new(address: &str, username: &str, password: &str) -> Self {
        Self {
            address: address.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            max_connections: default_max_connections(),
            mailbox: default_mailbox(),
            index_path: None,
            validate_on_acquire: false,
        }
    }

    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))
    }

    /// `~/.maildisk.toml`, or `.maildisk.toml` when `HOME` is unset.
    pub fn default_path() -> PathBuf {
        home_dir()
            .unwrap_or_default()
            .join(".maildisk.toml")
    }

    /// Resolved location of the path index journal.
    pub fn index_path(&self) -> PathBuf {
        match &self.index_path {
            Some(path) => expand_home(path),
            None => home_dir()
                .unwrap_or_default()
                .join(".maildisk")
                .join("index.journal"),
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(&self.username, &self.password, self.max_connections)
            .with_mailbox(&self.mailbox)
            .with_validation(self.validate_on_acquire)
    }
}

impl std::fmt::Debug for DiskConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("mailbox", &self.mailbox)
            .field("index_path", &self.index_path)
            .field("validate_on_acquire", &self.validate_on_acquire)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let c = DiskConfig::from_toml_str(
            r#"
            address = "imap.example.com:993"
            username = "me"
            password = "pw"
            "#,
        )
        .unwrap();
        assert_eq!(c.address, "imap.example.com:993");
        assert_eq!(c.max_connections, 4);
        assert_eq!(c.mailbox, "MDDATA");
        assert!(c.index_path.is_none());
        assert!(!c.validate_on_acquire);
    }

    #[test]
    fn full_config() {
        let c = DiskConfig::from_toml_str(
            r#"
            address = "mail.local"
            username = "me"
            password = "pw"
            max_connections = 16
            mailbox = "BLOCKS"
            index_path = "/var/lib/maildisk/index.journal"
            validate_on_acquire = true
            "#,
        )
        .unwrap();
        assert_eq!(c.max_connections, 16);
        assert_eq!(c.index_path(), PathBuf::from("/var/lib/maildisk/index.journal"));

        let pool = c.pool_config();
        assert_eq!(pool.mailbox, "BLOCKS");
        assert_eq!(pool.max_connections, 16);
        assert!(pool.validate_on_acquire);
        assert_eq!(pool.credentials.username, "me");
    }

    #[test]
    fn missing_field_and_unknown_field_are_errors() {
        let missing = DiskConfig::from_toml_str("address = \"x\"\nusername = \"u\"\n");
        assert!(matches!(missing, Err(SdkError::Config(_))));

        let unknown = DiskConfig::from_toml_str(
            "address = \"x\"\nusername = \"u\"\npassword = \"p\"\nmaxconn = 3\n",
        );
        assert!(matches!(unknown, Err(SdkError::Config(_))));
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = DiskConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));

        let path = dir.path().join("maildisk.toml");
        std::fs::write(&path, "address = \"a\"\nusername = \"u\"\npassword = \"p\"\n").unwrap();
        assert_eq!(DiskConfig::load(&path).unwrap().username, "u");
    }

    #[test]
    fn debug_redacts_password() {
        let c = DiskConfig::new("host", "user", "hunter2");
        assert!(!format!("{c:?}").contains("hunter2"));
    }

    #[test]
    fn relative_index_path_is_kept() {
        let mut c = DiskConfig::new("host", "user", "pw");
        c.index_path = Some(PathBuf::from("data/index.journal"));
        assert_eq!(c.index_path(), PathBuf::from("data/index.journal"));
    }
}
