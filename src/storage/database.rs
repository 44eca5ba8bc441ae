//! `SQLite` database connection.
//!
//! The database is stored at `~/.condosync/condosync.db` and holds the
//! key-value table the offline queue persists into. Several condosync
//! processes may share the file; writers serialize through immediate
//! transactions and wait on each other up to [`BUSY_TIMEOUT`].

use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::config::Paths;
use crate::error::SyncError;

use super::migrations;

/// How long a writer waits for another connection's write lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at the default location.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open() -> Result<Self, SyncError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database)
    }

    /// Open the database at a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &std::path::Path) -> Result<Self, SyncError> {
        let conn = Connection::open(path).map_err(|e| {
            SyncError::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| SyncError::Database(format!("Failed to set busy timeout: {e}")))?;
        // WAL keeps readers from blocking the single writer
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| SyncError::Database(format!("Failed to enable WAL: {e}")))?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            SyncError::Database(format!("Failed to open in-memory database: {e}"))
        })?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    fn migrate(&self) -> Result<(), SyncError> {
        migrations::run(&self.conn)
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, SyncError> {
        migrations::get_version(&self.conn)
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken before `f` reads anything, so a
    /// read-modify-write in `f` cannot interleave with another connection's.
    /// The transaction commits if `f` succeeds and rolls back otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken within [`BUSY_TIMEOUT`],
    /// if `f` fails, or if the commit fails.
    pub fn immediate<T>(
        &mut self,
        f: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    ) -> Result<T, SyncError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| SyncError::Database(format!("Failed to begin transaction: {e}")))?;

        let value = f(&tx).map_err(|e| SyncError::Database(format!("Transaction failed: {e}")))?;

        tx.commit()
            .map_err(|e| SyncError::Database(format!("Failed to commit: {e}")))?;
        Ok(value)
    }
}
