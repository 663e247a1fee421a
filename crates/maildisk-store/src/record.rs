//! On-the-wire form of a block.
//!
//! A record is a minimal RFC 5322 message:
//!
//! ```text
//! Subject: <hex digest>\r\n
//! To: <hex tag>\r\n
//! Date: <RFC 2822 timestamp>\r\n
//! \r\n
//! <base64 payload, wrapped at 78 columns, CRLF after every line>
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use maildisk_types::{Digest, Tag};

/// Maximum body line length, per the message-format convention.
pub const LINE_WIDTH: usize = 78;

/// Render the message text for one block.
pub fn encode(tag: Tag, digest: &Digest, data: &[u8], timestamp: DateTime<Utc>) -> Vec<u8> {
    let mut message = format!(
        "Subject: {}\r\nTo: {}\r\nDate: {}\r\n\r\n",
        digest.to_hex(),
        tag.to_hex(),
        timestamp.to_rfc2822()
    )
    .into_bytes();

    let body = STANDARD.encode(data);
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        message.extend_from_slice(line);
        message.extend_from_slice(b"\r\n");
    }
    message
}

/// Decode a fetched message body back into block bytes.
///
/// Line breaks and any other ASCII whitespace introduced in transport are
/// ignored.
pub fn decode_body(body: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact)
}
