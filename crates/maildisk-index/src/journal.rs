//! File-backed path index.
//!
//! Every `set` appends one framed entry to a journal file:
//!
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized JournalEntry)]
//! ```
//!
//! Opening the journal replays it front to back into a `BTreeMap`; a later
//! entry for the same path wins. Entries failing the CRC are skipped. A torn
//! tail left by a crash is cut off so new entries land on a clean boundary.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use maildisk_types::Digest;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IndexError, Result};
use crate::traits::{scan_prefix, PathIndex};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// When journal writes are forced to stable storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every entry.
    EveryWrite,
    /// Flush to the OS and let it decide.
    #[default]
    OsDefault,
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
    path: String,
    digest: Digest,
}

fn frame(entry: &JournalEntry) -> Result<Vec<u8>> {
    let payload = bincode::serialize(entry).map_err(|e| IndexError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| IndexError::Serialization("journal entry too large".into()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Replay raw journal bytes. Returns the live map and the length of the
/// well-formed prefix.
fn replay(bytes: &[u8]) -> (BTreeMap<String, Digest>, u64) {
    let mut entries = BTreeMap::new();
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= bytes.len() {
        let h = &bytes[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([h[0], h[1], h[2], h[3]]) as usize;
        let expected_crc = u32::from_le_bytes([h[4], h[5], h[6], h[7]]);
        let end = offset + HEADER_SIZE + length;

        if length == 0 || end > bytes.len() {
            warn!(offset, length, file_len = bytes.len(), "invalid journal entry length; stopping replay");
            break;
        }

        let payload = &bytes[offset + HEADER_SIZE..end];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(offset, expected = expected_crc, actual = actual_crc, "CRC mismatch; skipping entry");
        } else {
            match bincode::deserialize::<JournalEntry>(payload) {
                Ok(entry) => {
                    entries.insert(entry.path, entry.digest);
                }
                Err(e) => warn!(offset, error = %e, "failed to deserialize journal entry; skipping"),
            }
        }
        offset = end;
    }

    (entries, offset as u64)
}

/// A [`PathIndex`] persisted as an append-only journal.
pub struct JournalPathIndex {
    path: PathBuf,
    sync_mode: SyncMode,
    writer: Mutex<BufWriter<File>>,
    entries: RwLock<BTreeMap<String, Digest>>,
}

impl JournalPathIndex {
    /// Open (or create) the journal at `path` with [`SyncMode::OsDefault`].
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, SyncMode::default())
    }

    pub fn open_with(path: &Path, sync_mode: SyncMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let bytes = fs::read(path)?;
        let (entries, valid_len) = replay(&bytes);
        if valid_len < bytes.len() as u64 {
            warn!(
                valid_len,
                file_len = bytes.len(),
                path = %path.display(),
                "discarding torn journal tail"
            );
            file.set_len(valid_len)?;
        }
        debug!(entries = entries.len(), path = %path.display(), "path journal replayed");

        Ok(Self {
            path: path.to_path_buf(),
            sync_mode,
            writer: Mutex::new(BufWriter::new(file)),
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PathIndex for JournalPathIndex {
    fn set(&self, path: &str, digest: Digest) -> Result<()> {
        let buf = frame(&JournalEntry {
            path: path.to_string(),
            digest,
        })?;

        // The writer lock orders journal appends with map updates.
        let mut writer = self.writer.lock().map_err(|_| IndexError::LockPoisoned)?;
        writer.write_all(&buf)?;
        writer.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            writer.get_ref().sync_all()?;
        }

        self.entries
            .write()
            .map_err(|_| IndexError::LockPoisoned)?
            .insert(path.to_string(), digest);
        debug!(path, digest = %digest.short_hex(), "path index updated");
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Digest>> {
        let entries = self.entries.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(entries.get(path).copied())
    }

    fn iterate_prefix(&self, prefix: &str) -> Result<Vec<(String, Digest)>> {
        let entries = self.entries.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(scan_prefix(&entries, prefix))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(|_| IndexError::LockPoisoned)?.len())
    }

    /// Rewrite the journal with exactly one entry per live path and return
    /// how many entries were written.
    ///
    /// The new journal is written to a temporary file in the same directory
    /// and renamed over the old one.
    fn compact(&self) -> Result<usize> {
        let mut writer = self.writer.lock().map_err(|_| IndexError::LockPoisoned)?;
        let entries = self.entries.read().map_err(|_| IndexError::LockPoisoned)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            for (path, digest) in entries.iter() {
                out.write_all(&frame(&JournalEntry {
                    path: path.clone(),
                    digest: *digest,
                })?)?;
            }
            out.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        *writer = BufWriter::new(file);

        debug!(entries = entries.len(), path = %self.path.display(), "path journal compacted");
        Ok(entries.len())
    }
}

impl std::fmt::Debug for JournalPathIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalPathIndex")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}
