//! Key-value persistence used by the offline queue.
//!
//! Values are opaque strings. Callers store whole serialized documents and
//! rewrite them on every change. A read-modify-write goes through
//! [`KeyValueStore::compare_and_swap`] so a concurrent writer, in this
//! process or another one, is detected instead of overwritten.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::SyncError;

/// Synchronous string storage scoped to the application.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SyncError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), SyncError>;

    /// Remove `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), SyncError>;

    /// Atomically replace the value under `key` with `value` (`None`
    /// removes it), but only if the stored value still equals `expected`
    /// (`None` meaning absent). Returns whether the swap happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or written.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<String>,
        value: Option<String>,
    ) -> Result<bool, SyncError>;
}

const UPSERT: &str = r"INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET
    value = excluded.value,
    updated_at = excluded.updated_at";

/// Key-value store persisted in the `kv_store` table.
pub struct SqliteKvStore {
    db: Mutex<Database>,
}

impl SqliteKvStore {
    /// Wrap an open database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the store at the default database location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open() -> Result<Self, SyncError> {
        Ok(Self::new(Database::open()?))
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&mut Database) -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        let mut db = self
            .db
            .lock()
            .map_err(|_| SyncError::Database("Database lock poisoned".to_string()))?;
        f(&mut db)
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        self.with_db(|db| {
            db.connection()
                .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(|e| SyncError::Database(format!("Failed to read key {key}: {e}")))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.with_db(|db| {
            db.connection()
                .execute(UPSERT, params![key, value, Utc::now().to_rfc3339()])
                .map_err(|e| SyncError::Database(format!("Failed to write key {key}: {e}")))?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        self.with_db(|db| {
            db.connection()
                .execute("DELETE FROM kv_store WHERE key = ?1", [key])
                .map_err(|e| SyncError::Database(format!("Failed to remove key {key}: {e}")))?;
            Ok(())
        })
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<String>,
        value: Option<String>,
    ) -> Result<bool, SyncError> {
        self.with_db(|db| {
            db.immediate(|tx| {
                let current: Option<String> = tx
                    .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                        row.get(0)
                    })
                    .optional()?;
                if current != expected {
                    return Ok(false);
                }

                match &value {
                    Some(value) => tx.execute(UPSERT, params![key, value, Utc::now().to_rfc3339()])?,
                    None => tx.execute("DELETE FROM kv_store WHERE key = ?1", [key])?,
                };
                Ok(true)
            })
        })
    }
}

/// Ephemeral store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, SyncError> {
        self.values
            .lock()
            .map_err(|_| SyncError::Database("Memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        self.values()?.remove(key);
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<String>,
        value: Option<String>,
    ) -> Result<bool, SyncError> {
        let mut values = self.values()?;
        if values.get(key) != expected.as_ref() {
            return Ok(false);
        }

        match value {
            Some(value) => values.insert(key.to_string(), value),
            None => values.remove(key),
        };
        Ok(true)
    }
}
