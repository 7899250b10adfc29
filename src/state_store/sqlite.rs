//! SQLite-backed state store implementation.
//!
//! This module provides [`SqliteStateStore`], a persistent implementation
//! of [`StateStore`] backed by SQLite.

use crate::{Result, WizardError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::StateStore;

/// Schema version for migrations.
const SCHEMA_VERSION: i32 = 1;

/// SQL for creating the kv_entries table.
const CREATE_ENTRIES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS kv_entries (
        key TEXT NOT NULL PRIMARY KEY,
        value_json TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

/// SQL for creating the schema_version table.
const CREATE_SCHEMA_VERSION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    )
"#;

/// A SQLite-backed implementation of [`StateStore`].
///
/// Runs persisted here survive process restarts, which pairs with
/// pausing and resuming a wizard on a different process.
///
/// # Thread Safety
///
/// The store wraps the SQLite connection in a `Mutex` and uses
/// `spawn_blocking` for all database operations.
///
/// # Example
///
/// ```rust,ignore
/// use stepwise::SqliteStateStore;
///
/// let store = SqliteStateStore::open("wizard.db").await?;
/// let store = SqliteStateStore::open_in_memory().await?;
/// ```
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStateStore {
    /// Opens a SQLite database at the given path.
    ///
    /// Creates the database and schema if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let conn = tokio::task::spawn_blocking(move || Connection::open(&path))
            .await
            .map_err(|e| WizardError::StateStore(format!("spawn_blocking failed: {}", e)))?
            .map_err(|e| WizardError::Database(format!("failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.run_migrations().await?;
        Ok(store)
    }

    /// Opens an in-memory SQLite database.
    ///
    /// The database is lost when the store is dropped.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(Connection::open_in_memory)
            .await
            .map_err(|e| WizardError::StateStore(format!("spawn_blocking failed: {}", e)))?
            .map_err(|e| {
                WizardError::Database(format!("failed to open in-memory database: {}", e))
            })?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();

            conn.execute(CREATE_SCHEMA_VERSION_TABLE, [])?;

            let version: Option<i32> = conn
                .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                    row.get(0)
                })
                .optional()?;

            if version.map_or(true, |v| v < SCHEMA_VERSION) {
                conn.execute(CREATE_ENTRIES_TABLE, [])?;
                conn.execute("DELETE FROM schema_version", [])?;
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )?;
            }

            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(|e| WizardError::StateStore(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| WizardError::Database(format!("migration failed: {}", e)))
    }

    /// Returns every stored key in order.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare("SELECT key FROM kv_entries ORDER BY key")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<String>, _>>()
        })
        .await
        .map_err(|e| WizardError::StateStore(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| WizardError::Database(format!("query failed: {}", e)))
    }
}

// Debug implementation that doesn't expose connection details
impl std::fmt::Debug for SqliteStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStateStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn has(&self, key: &str) -> Result<bool> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok::<bool, rusqlite::Error>(found.is_some())
        })
        .await
        .map_err(|e| WizardError::StateStore(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| WizardError::Database(format!("query failed: {}", e)))
    }

    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();

        let raw = tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.query_row(
                "SELECT value_json FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
        .map_err(|e| WizardError::StateStore(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| WizardError::Database(format!("query failed: {}", e)))?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&mut self, key: &str, value: &JsonValue) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();
        let value_json = serde_json::to_string(value)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT OR REPLACE INTO kv_entries (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value_json, updated_at],
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(|e| WizardError::StateStore(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| WizardError::Database(format!("insert failed: {}", e)))
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(|e| WizardError::StateStore(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| WizardError::Database(format!("delete failed: {}", e)))
    }
}
