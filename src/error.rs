//! Error types for condosync.

use thiserror::Error;

use crate::remote::RemoteError;

/// Errors that can occur while queueing or replaying mutations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The local database failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input or persisted data could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Persisting the queue failed; the mutation was not recorded.
    #[error("Failed to write offline queue: {0}")]
    QueueWrite(String),

    /// The remote service rejected a call.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A replayed call did not resolve within the configured timeout.
    #[error("Timed out after {0}s waiting for {1}")]
    Timeout(u64, String),

    /// The entry can never be replayed and belongs in the dead-letter list.
    #[error("Unprocessable entry {module}:{action}: {reason}")]
    DeadLetter {
        module: String,
        action: String,
        reason: String,
    },

    /// A queue entry was not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl SyncError {
    /// Whether replaying the same entry again can ever succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::DeadLetter { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
