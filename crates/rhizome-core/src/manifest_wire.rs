//! Fixed-header encoding used to stash a [`Manifest`] on disk when it has
//! to round-trip through a temp file — specifically the manifest-by-prefix
//! fetch path (spec.md §4.6: "parse the downloaded bytes as a manifest").
//!
//! Real manifest parsing is an external collaborator (§1, out of scope);
//! this is a stand-in wire format so that path has something concrete to
//! decode: a `#[repr(C, packed)]` header with `zerocopy` derives and a
//! compile-time size guard. `raw` is appended after the header since it
//! is variable-length.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::manifest::{Bid, FileHash, Manifest};

const FILE_HASH_WIDTH: usize = 64;

#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
struct ManifestHeader {
    bid: [u8; 32],
    version: u64,
    payload_length: u64,
    file_hash_present: u8,
    /// Ascii hex, zero-padded. Only meaningful if `file_hash_present != 0`.
    file_hash: [u8; FILE_HASH_WIDTH],
    ttl: u8,
    self_signed: u8,
    raw_len: u32,
}

assert_eq_size!(ManifestHeader, [u8; 32 + 8 + 8 + 1 + FILE_HASH_WIDTH + 1 + 1 + 4]);

const HEADER_SIZE: usize = std::mem::size_of::<ManifestHeader>();

/// Encode a manifest as `header ++ raw`.
pub fn encode(manifest: &Manifest) -> Vec<u8> {
    let mut file_hash = [0u8; FILE_HASH_WIDTH];
    let file_hash_present = if let Some(h) = &manifest.file_hash {
        let bytes = h.as_str().as_bytes();
        let n = bytes.len().min(FILE_HASH_WIDTH);
        file_hash[..n].copy_from_slice(&bytes[..n]);
        1
    } else {
        0
    };
    let header = ManifestHeader {
        bid: manifest.bid.0,
        version: manifest.version,
        payload_length: manifest.payload_length,
        file_hash_present,
        file_hash,
        ttl: manifest.ttl,
        self_signed: manifest.self_signed as u8,
        raw_len: manifest.raw.len() as u32,
    };
    let mut out = header.as_bytes().to_vec();
    out.extend_from_slice(&manifest.raw);
    out
}

/// Decode bytes previously produced by [`encode`]. Returns `None` on any
/// structural mismatch (too short, declared `raw_len` past the end).
pub fn decode(bytes: &[u8]) -> Option<Manifest> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }
    let header = ManifestHeader::read_from(&bytes[..HEADER_SIZE])?;
    let raw_len = header.raw_len as usize;
    let raw_start = HEADER_SIZE;
    let raw_end = raw_start.checked_add(raw_len)?;
    if raw_end > bytes.len() {
        return None;
    }
    let file_hash = if header.file_hash_present != 0 {
        let end = header.file_hash.iter().position(|&b| b == 0).unwrap_or(FILE_HASH_WIDTH);
        let text = std::str::from_utf8(&header.file_hash[..end]).ok()?;
        Some(FileHash::new(text))
    } else {
        None
    };
    Some(Manifest {
        bid: Bid(header.bid),
        version: header.version,
        payload_length: header.payload_length,
        file_hash,
        ttl: header.ttl,
        self_signed: header.self_signed != 0,
        raw: bytes[raw_start..raw_end].to_vec(),
    })
}
