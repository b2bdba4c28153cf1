//! SQLite-backed implementation of [`crate::ManifestStore`].
//!
//! Schema mirrors the two tables the original design queries directly
//! (`manifests`, `files`); this crate owns their creation since their
//! full design (indices, payload blob storage, etc.) is out of scope.

use std::path::Path;
use std::sync::Mutex;

use rhizome_core::{Bid, FileHash, Manifest};
use rusqlite::{params, Connection};

use crate::{ManifestStore, StoreError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS manifests (
                id      TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                filehash TEXT,
                ttl     INTEGER NOT NULL,
                raw     BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS files (
                id        TEXT PRIMARY KEY,
                datavalid INTEGER NOT NULL
             );",
        )?;
        Ok(())
    }
}

impl ManifestStore for SqliteStore {
    fn select_version(&self, bid: &Bid) -> Result<Option<u64>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT version FROM manifests WHERE id = ?1")?;
        let mut rows = stmt.query(params![bid.to_hex()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get::<_, i64>(0)? as u64)),
            None => Ok(None),
        }
    }

    fn has_valid_payload(&self, fhash: &FileHash) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM files WHERE id = ?1 AND datavalid = 1",
            params![fhash.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn import_bundle(&self, manifest: &Manifest, ttl: u8) -> Result<(), StoreError> {
        let fhash = manifest.file_hash.as_ref().map(|h| h.as_str().to_string());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO manifests (id, version, filehash, ttl, raw) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET version=excluded.version, filehash=excluded.filehash,
                ttl=excluded.ttl, raw=excluded.raw",
            params![
                manifest.bid.to_hex(),
                manifest.version as i64,
                fhash,
                ttl as i64,
                manifest.raw
            ],
        )?;
        if let Some(h) = &manifest.file_hash {
            conn.execute(
                "INSERT INTO files (id, datavalid) VALUES (?1, 1)
                 ON CONFLICT(id) DO UPDATE SET datavalid=1",
                params![h.as_str()],
            )?;
        }
        tracing::debug!(bid = %manifest.bid.to_hex(), version = manifest.version, "bundle imported");
        Ok(())
    }
}
