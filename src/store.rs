//! Persistent key/value store
//!
//! The recency engine persists through the [`KeyValueStore`] trait so it
//! never knows where its state lives. [`SqliteStore`] keeps values as JSON
//! text in a single table; [`MemoryStore`] is for tests and ephemeral runs.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Database file name inside the state directory
pub const STATE_DB: &str = "state.db";

/// Process-wide get/set store of JSON values
pub trait KeyValueStore: Send + Sync {
    /// Read a value (None if never set)
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Replace a value
    fn set(&self, key: &str, value: &serde_json::Value) -> Result<()>;
}

/// SQLite-backed store
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the store at `db_path`
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Open `<state_dir>/state.db`
    pub fn in_dir(state_dir: &Path) -> Result<Self> {
        Self::open(&state_dir.join(STATE_DB))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open {}", self.db_path.display()))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        log::debug!("Key/value store schema initialized at {}", self.db_path.display());
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.connect()?;

        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()?;

        match raw {
            Some(text) => {
                let value = serde_json::from_str(&text)
                    .with_context(|| format!("Stored value for '{}' is not valid JSON", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.connect()?;
        let text = serde_json::to_string(value).context("Failed to serialize value")?;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, text, now],
        )?;

        log::debug!("Stored '{}' ({} bytes)", key, text.len());
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_get_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::in_dir(temp.path()).unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_sqlite_set_get_and_overwrite() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::in_dir(temp.path()).unwrap();

        store.set("k", &json!({"a": 1})).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({"a": 1})));

        store.set("k", &json!({"a": 2})).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({"a": 2})));
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = SqliteStore::in_dir(temp.path()).unwrap();
            store.set("k", &json!([1, 2, 3])).unwrap();
        }
        let reopened = SqliteStore::in_dir(temp.path()).unwrap();
        assert_eq!(reopened.get("k").unwrap(), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_sqlite_creates_missing_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp.path().join("a/b/state.db")).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_sqlite_corrupt_value_is_error() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::in_dir(temp.path()).unwrap();
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES ('k', '{not json', 0)",
            [],
        )
        .unwrap();
        assert!(store.get("k").is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());
        store.set("k", &json!("v")).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!("v")));
    }
}
