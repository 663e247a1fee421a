//! `host:port` parsing for the configured server address.

use maildisk_store::{BackendError, BackendResult};

/// Implicit-TLS IMAP port, used when the address names no port.
pub const DEFAULT_IMAPS_PORT: u16 = 993;

/// Split `address` into a host name and port.
///
/// Accepts `host`, `host:port`, `[v6]` and `[v6]:port`.
pub fn parse_address(address: &str) -> BackendResult<(String, u16)> {
    let address = address.trim();
    if address.is_empty() {
        return Err(BackendError::new("empty server address"));
    }

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| BackendError::new(format!("unterminated IPv6 address: {address}")))?;
        match tail {
            "" => (host, None),
            _ => {
                let port = tail.strip_prefix(':').ok_or_else(|| {
                    BackendError::new(format!("unexpected text after IPv6 address: {address}"))
                })?;
                (host, Some(port))
            }
        }
    } else {
        match address.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        }
    };

    if host.is_empty() {
        return Err(BackendError::new(format!("missing host in address: {address}")));
    }
    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| BackendError::new(format!("invalid port in address: {address}")))?,
        None => DEFAULT_IMAPS_PORT,
    };
    Ok((host.to_string(), port))
}
