//! SQLite-backed store for running without Firebase

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::{KeyValueStore, StoreError, StorePath};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    path TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Task(format!("failed to create {:?}: {}", parent, e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Opened SQLite store at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Read back a value. Not used by the bot itself.
    pub fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Task("connection mutex poisoned".to_string()))?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv WHERE path = ?1",
                params![path.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let key = path.to_string();
        let body = serde_json::to_string(&value)?;
        let conn = self.conn.clone();

        debug!("sqlite store set {}", key);
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Task("connection mutex poisoned".to_string()))?;
            conn.execute(
                "INSERT INTO kv (path, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, body, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
