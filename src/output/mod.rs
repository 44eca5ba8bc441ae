//! Output formatting for condosync.
//!
//! This module renders queue contents and sync status for the terminal.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::SyncError;
use crate::offline::{DeadLetter, PendingMutation};
use crate::sync::{DrainOutcome, SyncStatus};

pub use json::*;
pub use pretty::*;

/// Format the pending queue based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_queue(entries: &[PendingMutation], format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_queue_pretty(entries)),
        OutputFormat::Json => format_queue_json(entries),
    }
}

/// Format dead letters based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_dead_letters(letters: &[DeadLetter], format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_dead_letters_pretty(letters)),
        OutputFormat::Json => format_dead_letters_json(letters),
    }
}

/// Format sync status based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_status(status: &SyncStatus, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_status_pretty(status)),
        OutputFormat::Json => to_json(status),
    }
}

/// Format a drain result based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_outcome(outcome: &DrainOutcome, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_outcome_pretty(outcome)),
        OutputFormat::Json => to_json(outcome),
    }
}
