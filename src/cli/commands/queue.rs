//! Queue and dead-letter inspection commands.

use colored::Colorize;
use serde_json::{json, Value};

use crate::cli::args::{DeadLetterCommands, OutputFormat, QueueCommands};
use crate::error::SyncError;
use crate::offline::OfflineQueue;
use crate::output::{format_dead_letters, format_queue, to_json};

use super::Environment;

/// Execute queue subcommands.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written, the payload is
/// not a JSON object, or `remove` names an id that is not queued.
pub fn queue(
    env: &Environment,
    cmd: QueueCommands,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let queue = env.open_queue()?;

    match cmd {
        QueueCommands::List => format_queue(&queue.get_queue()?, format),
        QueueCommands::Add {
            module,
            action,
            payload,
        } => add_entry(&queue, &module, &action, &payload, format),
        QueueCommands::Remove { id } => remove_entry(&queue, &id, format),
        QueueCommands::Clear => {
            let count = queue.len()?;
            queue.clear_queue()?;
            match format {
                OutputFormat::Json => to_json(&json!({ "cleared": count })),
                OutputFormat::Pretty => Ok(format!("{} Cleared {count} queued entries", "✓".green())),
            }
        }
    }
}

fn add_entry(
    queue: &OfflineQueue,
    module: &str,
    action: &str,
    payload: &str,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let payload: Value = serde_json::from_str(payload)?;
    if !payload.is_object() {
        return Err(SyncError::Parse("Payload must be a JSON object".to_string()));
    }

    let entry = queue.enqueue(module, action, payload)?;
    let routable = entry.route().is_some();
    if !routable {
        tracing::warn!(label = %entry.label(), "No handler for this route, it will be dead-lettered on sync");
    }

    match format {
        OutputFormat::Json => to_json(&entry),
        OutputFormat::Pretty => {
            let mut line = format!(
                "{} Queued {} ({})",
                "✓".green(),
                entry.label().bold(),
                entry.id.dimmed()
            );
            if !routable {
                line.push_str(&format!("\n  {}", "no handler for this route".yellow()));
            }
            Ok(line)
        }
    }
}

fn remove_entry(queue: &OfflineQueue, id: &str, format: OutputFormat) -> Result<String, SyncError> {
    if !queue.get_queue()?.iter().any(|e| e.id == id) {
        return Err(SyncError::NotFound(format!("queued entry {id}")));
    }
    queue.remove_from_queue(id)?;

    match format {
        OutputFormat::Json => to_json(&json!({ "removed": id })),
        OutputFormat::Pretty => Ok(format!("{} Removed {}", "✓".green(), id.dimmed())),
    }
}

/// Execute dead-letter subcommands.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written.
pub fn dead_letter(
    env: &Environment,
    cmd: DeadLetterCommands,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let queue = env.open_queue()?;

    match cmd {
        DeadLetterCommands::List => format_dead_letters(&queue.dead_letters()?, format),
        DeadLetterCommands::Clear => {
            let count = queue.dead_letters()?.len();
            queue.clear_dead_letters()?;
            match format {
                OutputFormat::Json => to_json(&json!({ "cleared": count })),
                OutputFormat::Pretty => Ok(format!("{} Cleared {count} dead letters", "✓".green())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use std::sync::Arc;

    fn memory_queue() -> OfflineQueue {
        OfflineQueue::new(Arc::new(MemoryKvStore::new()))
    }

    #[test]
    fn test_add_entry_rejects_non_object() {
        let queue = memory_queue();

        let err = add_entry(&queue, "notices", "delete", "[1, 2]", OutputFormat::Pretty).unwrap_err();

        assert!(matches!(err, SyncError::Parse(_)));
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_add_entry_keeps_unknown_route() {
        let queue = memory_queue();

        let output = add_entry(&queue, "reservas", "create", "{}", OutputFormat::Pretty).unwrap();

        assert!(output.contains("reservas:create"));
        assert!(output.contains("no handler"));
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_remove_unknown_id_is_not_found() {
        let queue = memory_queue();
        queue.enqueue("notices", "delete", json!({"id": "n-1"})).unwrap();

        let err = remove_entry(&queue, "missing", OutputFormat::Pretty).unwrap_err();

        assert!(matches!(err, SyncError::NotFound(_)));
        assert_eq!(queue.len().unwrap(), 1);
    }
}
