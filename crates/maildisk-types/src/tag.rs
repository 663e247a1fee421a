use std::fmt;

/// Namespace for the shared hash space.
///
/// Identical bytes stored under different tags produce distinct records, so
/// content trees (`DATA`) and path attributions (`ATTR`) never collide even
/// though both are keyed by the same SHA-256 digests.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(&'static [u8]);

impl Tag {
    /// Raw content trees.
    pub const DATA: Self = Self(b"DATA");
    /// Records binding a root digest to a path.
    pub const ATTR: Self = Self(b"ATTR");

    /// A custom namespace.
    pub const fn new(name: &'static [u8]) -> Self {
        Self(name)
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.0
    }

    /// Lowercase hex, as used in the `To` header of a record.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", String::from_utf8_lossy(self.0))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.0))
    }
}
