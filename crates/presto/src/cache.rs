// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! SQLite-backed file cache.
//!
//! One record per path: the last transformed content, the mtime it
//! corresponds to, the resolved type/targets, and a revision counter.
//! Writes are compare-and-swap on the revision: a writer fetches the
//! current revision immediately before writing and attaches it; a
//! stale-revision write surfaces [`Error::CacheConflict`] instead of
//! silently overwriting.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::file::{FileType, Target};

/// A cached record for one path.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    /// Relative path the record is keyed by.
    pub path: String,
    /// Resolved type at the time of the write.
    pub file_type: FileType,
    /// Resolved targets at the time of the write.
    pub targets: Vec<Target>,
    /// Last transformed content.
    pub content: String,
    /// Source mtime in milliseconds since the epoch.
    pub timestamp: i64,
    /// Revision counter for compare-and-swap writes.
    pub revision: i64,
}

/// Content-addressed per-path store inside the build directory.
pub struct CacheStore {
    conn: Mutex<Connection>,
}

impl CacheStore {
    /// Opens (or creates) the cache database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Cache(format!("failed to open cache database: {}", e)))?;
        Self::init(conn)
    }

    /// An in-memory store, used by tests and throwaway compiles.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Cache(format!("failed to open cache database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                targets TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                revision INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| Error::Cache(format!("failed to create cache table: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fetches the record for a path, if one exists.
    pub fn get(&self, path: &str) -> Result<Option<CacheRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT type, targets, content, timestamp, revision FROM files WHERE path = ?1",
                params![path],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| Error::Cache(e.to_string()))?;

        let Some((type_str, targets_str, content, timestamp, revision)) = row else {
            return Ok(None);
        };

        let file_type = FileType::parse(&type_str)
            .ok_or_else(|| Error::Cache(format!("corrupt type for '{}'", path)))?;
        let targets: Vec<Target> = serde_json::from_str(&targets_str)
            .map_err(|e| Error::Cache(format!("corrupt targets for '{}': {}", path, e)))?;

        Ok(Some(CacheRecord {
            path: path.to_string(),
            file_type,
            targets,
            content,
            timestamp,
            revision,
        }))
    }

    /// Fetches only the current revision for a path.
    pub fn revision(&self, path: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT revision FROM files WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::Cache(e.to_string()))
    }

    /// Writes a record with compare-and-swap semantics.
    ///
    /// `expected` must be the revision fetched immediately before the
    /// write, or `None` when the writer believes no record exists.
    /// Returns the new revision. A mismatch (the record changed, appeared
    /// or disappeared underneath the writer) is [`Error::CacheConflict`].
    pub fn put(
        &self,
        path: &str,
        file_type: FileType,
        targets: &[Target],
        content: &str,
        timestamp: i64,
        expected: Option<i64>,
    ) -> Result<i64> {
        let type_str = file_type.as_str();
        let targets_str = serde_json::to_string(targets)?;

        let conn = self.lock()?;
        match expected {
            None => {
                let inserted = conn
                    .execute(
                        "INSERT OR IGNORE INTO files \
                         (path, type, targets, content, timestamp, revision) \
                         VALUES (?1, ?2, ?3, ?4, ?5, 1)",
                        params![path, type_str, targets_str, content, timestamp],
                    )
                    .map_err(|e| Error::Cache(e.to_string()))?;
                if inserted == 0 {
                    return Err(Error::CacheConflict(path.to_string()));
                }
                Ok(1)
            }
            Some(rev) => {
                let updated = conn
                    .execute(
                        "UPDATE files SET type = ?2, targets = ?3, content = ?4, \
                         timestamp = ?5, revision = revision + 1 \
                         WHERE path = ?1 AND revision = ?6",
                        params![path, type_str, targets_str, content, timestamp, rev],
                    )
                    .map_err(|e| Error::Cache(e.to_string()))?;
                if updated == 0 {
                    return Err(Error::CacheConflict(path.to_string()));
                }
                Ok(rev + 1)
            }
        }
    }

    /// Deletes the record for a path. Deleting a missing record is fine.
    pub fn remove(&self, path: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM files WHERE path = ?1", params![path])
            .map_err(|e| Error::Cache(e.to_string()))?;
        Ok(())
    }

    /// Drops every record.
    pub fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM files", [])
            .map_err(|e| Error::Cache(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Cache("cache lock poisoned".to_string()))
    }
}
