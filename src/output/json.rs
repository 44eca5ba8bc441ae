//! JSON output formatting for condosync.

use serde::Serialize;
use serde_json::json;

use crate::error::SyncError;
use crate::offline::{DeadLetter, PendingMutation};

/// Format the pending queue as JSON, in the persisted record format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_queue_json(entries: &[PendingMutation]) -> Result<String, SyncError> {
    to_json(&json!({
        "count": entries.len(),
        "items": entries,
    }))
}

/// Format dead letters as JSON
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_dead_letters_json(letters: &[DeadLetter]) -> Result<String, SyncError> {
    to_json(&json!({
        "count": letters.len(),
        "items": letters,
    }))
}

/// Convert any serializable value to pretty JSON string
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, SyncError> {
    Ok(serde_json::to_string_pretty(value)?)
}
