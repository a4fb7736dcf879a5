use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Serialized UI tree as returned by the driver (page source).
///
/// Opaque to the crawler: it is only ever hashed, never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot(Vec<u8>);

impl PageSnapshot {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for PageSnapshot {
    fn from(source: String) -> Self {
        Self(source.into_bytes())
    }
}

impl From<&str> for PageSnapshot {
    fn from(source: &str) -> Self {
        Self(source.as_bytes().to_vec())
    }
}

/// Fixed-length digest of a `PageSnapshot`.
///
/// Two equal hashes are treated as the same UI state. Collisions are ignored.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotHash([u8; 20]);

impl SnapshotHash {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// First 8 hex chars, for log lines.
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl fmt::Display for SnapshotHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for SnapshotHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotHash({})", self.short())
    }
}

pub fn snapshot_hash(snapshot: &PageSnapshot) -> SnapshotHash {
    let mut hasher = Sha1::new();
    hasher.update(snapshot.as_bytes());

    let mut digest = [0u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    SnapshotHash(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_sources_hash_equal() {
        let a = snapshot_hash(&PageSnapshot::from("<hierarchy><node/></hierarchy>"));
        let b = snapshot_hash(&PageSnapshot::from("<hierarchy><node/></hierarchy>".to_string()));
        assert_eq!(a, b);
    }

    #[test]
    fn different_sources_hash_differently() {
        let a = snapshot_hash(&PageSnapshot::from("<a/>"));
        let b = snapshot_hash(&PageSnapshot::from("<b/>"));
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_forty_hex_chars() {
        let h = snapshot_hash(&PageSnapshot::from(""));
        // sha1 of the empty string
        assert_eq!(h.to_string(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(h.short(), "da39a3ee");
    }
}
