//! SQLite-backed store.
//!
//! A single `kv` table holding JSON text per key. This is the durable
//! medium the CLI host uses; each call is a short statement executed on the
//! caller's task.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tracing::warn;

use super::counter::count_from_value;
use super::{data_dir, Entries, Store};
use crate::error::{CoreError, StoreError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the store at `~/.config/shorts-quota/quota.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("quota.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection poisoned".into()))
    }
}

/// Rows that are not JSON come back as the raw string, so readers apply
/// their own per-key fallback instead of losing every other key.
fn decode(key: &str, raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(%key, error = %e, "stored value is not JSON, passing through raw");
        Value::String(raw.to_string())
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, keys: &[&str]) -> Result<Entries, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let mut out = Entries::new();
        for key in keys {
            let raw: Option<String> = stmt
                .query_row(params![key], |row| row.get(0))
                .optional()?;
            if let Some(raw) = raw {
                out.insert(key.to_string(), decode(key, &raw));
            }
        }
        Ok(out)
    }

    async fn set(&self, entries: Entries) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for (key, value) in &entries {
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for key in keys {
            tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn get_all(&self) -> Result<Entries, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM kv")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Entries::new();
        for row in rows {
            let (key, raw) = row?;
            let value = decode(&key, &raw);
            out.insert(key, value);
        }
        Ok(out)
    }

    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn()?;
        // IMMEDIATE takes the write lock up front so two processes sharing
        // the file serialize here instead of interleaving read and write.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw: Option<String> = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        let current = match raw {
            Some(raw) => count_from_value(key, &decode(key, &raw)).unwrap_or(0),
            None => 0,
        };
        let next = current + 1;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, Value::from(next).to_string()],
        )?;
        tx.commit()?;
        Ok(next)
    }
}
