//! SQLite-backed key-value store for view state
//!
//! Page indexes, page sizes and scroll anchors survive application restarts here.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tablex_core::{KeyValueStore, TablexError};

use crate::error::{ServiceError, ServiceResult};

pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteKeyValueStore {
    /// Open or create the store at the given path
    pub fn open(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServiceError::StorageFailed(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)?;
        Self::initialize(conn, Some(path.to_path_buf()))
    }

    /// Open the store in the platform data directory
    pub fn open_default() -> ServiceResult<Self> {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tablex")
            .join("view_state.db");
        Self::open(path)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> ServiceResult<Self> {
        Self::initialize(Connection::open_in_memory()?, None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(conn: Connection, path: Option<PathBuf>) -> ServiceResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        tracing::debug!(path = ?path, "opened view state store");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    fn read(&self, key: &str) -> ServiceResult<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> ServiceResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> tablex_core::Result<Option<String>> {
        self.read(key).map_err(TablexError::from)
    }

    fn set(&self, key: &str, value: &str) -> tablex_core::Result<()> {
        self.write(key, value).map_err(TablexError::from)
    }
}

impl std::fmt::Debug for SqliteKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKeyValueStore")
            .field("path", &self.path)
            .finish()
    }
}
