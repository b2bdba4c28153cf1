//! rhizome-store — the persistent bundle store and manifest verifier
//! collaborators described as interfaces in spec §6.
//!
//! Design of the relational schema itself is out of scope (§1) — only the
//! query surface the fetch scheduler depends on is specified:
//! `select_version`, `has_valid_payload`, `import_bundle`.

mod sqlite_store;
mod verify;

pub use sqlite_store::SqliteStore;
pub use verify::{ManifestVerifier, StubVerifier};

use rhizome_core::{Bid, FileHash, Manifest};

/// Error taxonomy for store access — callers treat any `Err` the same way
/// the spec requires: "propagate as unknown ... treated by callers as
/// do not fetch" (§4.1), never cached into the version cache (§7).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("manifest has no file hash")]
    MissingFileHash,
}

/// The persistent bundle store (§6 "Store" collaborator).
pub trait ManifestStore: Send + Sync {
    /// `SELECT version FROM manifests WHERE id=?`. `None` if no row.
    fn select_version(&self, bid: &Bid) -> Result<Option<u64>, StoreError>;

    /// `SELECT COUNT(*) FROM files WHERE id=FHASH AND datavalid=1`.
    fn has_valid_payload(&self, fhash: &FileHash) -> Result<bool, StoreError>;

    /// Persist a completed bundle. `ttl` is the value to store (already
    /// decremented by the caller per §4.6: "finalise it ... with `ttl - 1`").
    fn import_bundle(&self, manifest: &Manifest, ttl: u8) -> Result<(), StoreError>;
}
