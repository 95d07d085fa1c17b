//! An object store with per-object key-value maps, kept in SQLite.
//!
//! Objects live in pools. Each object has data, which is replaced as
//! a whole, and a map of string keys to byte values (the omap). A
//! batch of map entries is applied in a single SQLite transaction, so
//! either every pair in the batch is stored or none is.
//!
//! Like the rest of the crate, this is entirely synchronous. SQLite
//! allows one writer at a time, and callers share a store by putting
//! it behind a lock.

use crate::kvpair::Batch;
use log::{debug, trace};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS pools (name TEXT PRIMARY KEY NOT NULL)",
    "CREATE TABLE IF NOT EXISTS objects (
        pool TEXT NOT NULL,
        name TEXT NOT NULL,
        data BLOB NOT NULL,
        PRIMARY KEY (pool, name))",
    "CREATE TABLE IF NOT EXISTS omap (
        pool TEXT NOT NULL,
        object TEXT NOT NULL,
        key TEXT NOT NULL CHECK (key <> ''),
        value BLOB NOT NULL,
        PRIMARY KEY (pool, object, key))",
];

/// A store of objects and their maps, in one SQLite file.
pub struct ObjectStore {
    filename: PathBuf,
    conn: Connection,
}

impl ObjectStore {
    /// Open a store, creating the file and tables if needed.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self, ObjectStoreError> {
        let filename = filename.as_ref().to_path_buf();
        let conn = Connection::open(&filename)
            .map_err(|err| ObjectStoreError::Open(filename.clone(), err))?;
        for sql in SCHEMA {
            conn.execute(sql, params![])?;
        }
        debug!("opened object store {}", filename.display());
        Ok(Self { filename, conn })
    }

    /// Name of the file holding the store.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Create a pool, if it doesn't exist already.
    pub fn create_pool(&self, pool: &str) -> Result<(), ObjectStoreError> {
        self.conn
            .execute("INSERT OR IGNORE INTO pools (name) VALUES (?1)", params![pool])?;
        Ok(())
    }

    /// Does a pool exist?
    pub fn has_pool(&self, pool: &str) -> Result<bool, ObjectStoreError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM pools WHERE name = ?1",
                params![pool],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Replace an object's data, creating the object if needed.
    pub fn write_full(
        &mut self,
        pool: &str,
        object: &str,
        data: &[u8],
    ) -> Result<(), ObjectStoreError> {
        self.require_pool(pool)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO objects (pool, name, data) VALUES (?1, ?2, ?3)",
            params![pool, object, data],
        )?;
        trace!("wrote {} bytes to {}/{}", data.len(), pool, object);
        Ok(())
    }

    /// Remove an object, with its data and its whole map.
    ///
    /// Removing an object that doesn't exist is not an error.
    pub fn remove_object(&mut self, pool: &str, object: &str) -> Result<(), ObjectStoreError> {
        self.require_pool(pool)?;
        let tx = self.conn.transaction()?;
        let entries = tx.execute(
            "DELETE FROM omap WHERE pool = ?1 AND object = ?2",
            params![pool, object],
        )?;
        tx.execute(
            "DELETE FROM objects WHERE pool = ?1 AND name = ?2",
            params![pool, object],
        )?;
        tx.commit()?;
        trace!("removed {}/{} and {} omap entries", pool, object, entries);
        Ok(())
    }

    #[cfg(test)]
    fn read_full(&self, pool: &str, object: &str) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let data = self
            .conn
            .query_row(
                "SELECT data FROM objects WHERE pool = ?1 AND name = ?2",
                params![pool, object],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    /// Set entries in an object's map, all or nothing.
    ///
    /// The object is created with empty data if it doesn't exist.
    /// Entries with existing keys are replaced.
    pub fn omap_set(
        &mut self,
        pool: &str,
        object: &str,
        batch: &Batch,
    ) -> Result<(), ObjectStoreError> {
        self.require_pool(pool)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO objects (pool, name, data) VALUES (?1, ?2, ?3)",
            params![pool, object, &[] as &[u8]],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO omap (pool, object, key, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for pair in batch.iter() {
                stmt.execute(params![pool, object, pair.key(), pair.value()])?;
            }
        }
        tx.commit()?;
        trace!("set {} omap entries on {}/{}", batch.len(), pool, object);
        Ok(())
    }

    /// Number of entries in an object's map.
    pub fn omap_len(&self, pool: &str, object: &str) -> Result<u64, ObjectStoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM omap WHERE pool = ?1 AND object = ?2",
            params![pool, object],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    #[cfg(test)]
    fn omap_get(
        &self,
        pool: &str,
        object: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM omap WHERE pool = ?1 AND object = ?2 AND key = ?3",
                params![pool, object, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Close the store.
    pub fn close(self) -> Result<(), ObjectStoreError> {
        self.conn
            .close()
            .map_err(|(_, err)| ObjectStoreError::Rusqlite(err))?;
        debug!("closed object store {}", self.filename.display());
        Ok(())
    }

    fn require_pool(&self, pool: &str) -> Result<(), ObjectStoreError> {
        if self.has_pool(pool)? {
            Ok(())
        } else {
            Err(ObjectStoreError::NoSuchPool(pool.to_string()))
        }
    }
}

/// Possible errors from an object store.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// The store file couldn't be opened.
    #[error("failed to open object store {0}: {1}")]
    Open(PathBuf, #[source] rusqlite::Error),

    /// The pool doesn't exist.
    #[error("pool {0} does not exist")]
    NoSuchPool(String),

    /// An error from the rusqlite crate.
    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),
}
