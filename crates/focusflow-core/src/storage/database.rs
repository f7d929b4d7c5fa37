//! SQLite-backed key-value storage.
//!
//! One database file holds two tables:
//! - `preferences`: durable user settings (volumes, durations, background)
//! - `session_state`: the short-lived timer snapshot

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};

use super::{data_dir, PreferenceStore};
use crate::error::StorageError;

const PREFERENCES_TABLE: &str = "preferences";
const SESSION_STATE_TABLE: &str = "session_state";

/// SQLite database shared by the preference and snapshot stores.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open the database at `~/.config/focusflow/focusflow.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("focusflow.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS preferences (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_state (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn preferences(&self) -> SqliteStore {
        SqliteStore {
            conn: Arc::clone(&self.conn),
            table: PREFERENCES_TABLE,
        }
    }

    pub fn session_state(&self) -> SqliteStore {
        SqliteStore {
            conn: Arc::clone(&self.conn),
            table: SESSION_STATE_TABLE,
        }
    }
}

/// One table of [`Database`] viewed as a [`PreferenceStore`].
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: &'static str,
}

impl PreferenceStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let mut stmt = conn.prepare(&format!("SELECT value FROM {} WHERE key = ?1", self.table))?;
        match stmt.query_row(params![key], |row| row.get::<_, String>(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            &format!("INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)", self.table),
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", self.table),
            params![key],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        let prefs = db.preferences();
        assert!(prefs.get("test").unwrap().is_none());
        prefs.set("test", "hello").unwrap();
        assert_eq!(prefs.get("test").unwrap().unwrap(), "hello");
        prefs.set("test", "again").unwrap();
        assert_eq!(prefs.get("test").unwrap().unwrap(), "again");
    }

    #[test]
    fn tables_are_independent() {
        let db = Database::open_memory().unwrap();
        db.preferences().set("k", "durable").unwrap();
        db.session_state().set("k", "short").unwrap();
        db.session_state().remove("k").unwrap();
        assert_eq!(db.preferences().get("k").unwrap().as_deref(), Some("durable"));
        assert!(db.session_state().get("k").unwrap().is_none());
    }

    #[test]
    fn on_disk_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focusflow.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.preferences().set("focusflow-muted", "true").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(
            db.preferences().get("focusflow-muted").unwrap().as_deref(),
            Some("true")
        );
    }
}
