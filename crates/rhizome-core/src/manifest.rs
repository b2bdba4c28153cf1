//! Bundle identity and manifest types.
//!
//! Manifest parsing and signature verification are external collaborators
//! (see `rhizome-store::verify`) — this module only holds the fields the
//! fetch scheduler needs to reason about a bundle.

use std::fmt;

/// A 32-byte public signing key uniquely naming a bundle.
///
/// Equality and hashing are over the raw bytes; the canonical *textual*
/// form (used for store lookups and cache bins) is always uppercase hex,
/// produced by [`Bid::to_hex`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bid(pub [u8; 32]);

impl Bid {
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Some(Self(out))
    }

    /// Canonical uppercase hex form, as used by store queries and the
    /// version/ignore caches.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// First `n` bytes, used by the version cache's bin index and the
    /// ignore cache's 24-byte prefix match.
    pub fn prefix(&self, n: usize) -> &[u8] {
        &self.0[..n.min(32)]
    }
}

impl fmt::Debug for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bid({}…)", &self.to_hex()[..8])
    }
}

/// Content hash of a bundle's payload, used as its storage key.
///
/// Stored and compared case-insensitively but canonicalised to uppercase
/// hex on construction, matching the wire request
/// `GET /rhizome/file/<FHASH_uppercase_hex>`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FileHash(String);

impl FileHash {
    pub fn new(hex_text: impl AsRef<str>) -> Self {
        Self(hex_text.as_ref().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHash({})", self.0)
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author-chosen monotonic 64-bit generation number of a bundle.
pub type Version = u64;

/// A bundle manifest.
///
/// Owned by whichever [`crate::manifest`]-holding structure currently has
/// it (a candidate, a slot); Rust's move semantics give the "freed exactly
/// once on removal" rule of the original design for free — there is no
/// explicit free function.
#[derive(Clone, Debug)]
pub struct Manifest {
    pub bid: Bid,
    pub version: Version,
    pub payload_length: u64,
    pub file_hash: Option<FileHash>,
    /// Hop count; decremented by one on every store-and-forward.
    pub ttl: u8,
    /// If true, the manifest's own signature need not be independently
    /// re-verified by the admission path (§4.3 step 4/6 of the spec).
    pub self_signed: bool,
    /// Raw manifest bytes, as received — opaque to this crate.
    pub raw: Vec<u8>,
}

impl Manifest {
    pub fn empty_payload(&self) -> bool {
        self.payload_length == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_hex_roundtrip_is_canonical_uppercase() {
        let bid = Bid::from_hex(&"ab".repeat(32)).unwrap();
        assert_eq!(bid.to_hex(), "AB".repeat(32));
    }

    #[test]
    fn bid_from_hex_rejects_wrong_length() {
        assert!(Bid::from_hex("abcd").is_none());
    }

    #[test]
    fn file_hash_canonicalises_to_uppercase() {
        let fh = FileHash::new("deadbeef");
        assert_eq!(fh.as_str(), "DEADBEEF");
    }

    #[test]
    fn bid_prefix_returns_requested_bytes() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let bid = Bid(bytes);
        assert_eq!(bid.prefix(4), &[0, 1, 2, 3]);
    }
}
