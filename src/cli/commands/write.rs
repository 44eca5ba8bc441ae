//! Write commands routed through the offline writer.

use colored::Colorize;
use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::args::{OutputFormat, WriteCommands};
use crate::error::SyncError;
use crate::offline::Module;
use crate::output::to_json;
use crate::sync::{OfflineWriter, WriteOutcome};

use super::Environment;

/// Execute write subcommands.
///
/// # Errors
///
/// Returns an error if the module or payload is invalid, the queue cannot
/// be written while offline, or the backend rejects the write while online.
pub async fn write(
    env: &Environment,
    cmd: WriteCommands,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let coordinator = env.coordinator().await?;
    let writer = OfflineWriter::new(coordinator);

    match cmd {
        WriteCommands::Create { module, payload } => {
            let module = Module::parse(&module)
                .ok_or_else(|| SyncError::NotFound(format!("module '{module}'")))?;
            let payload: Value = serde_json::from_str(&payload)?;
            if !payload.is_object() {
                return Err(SyncError::Parse("Payload must be a JSON object".to_string()));
            }
            render(&writer.create(module, payload).await?, format)
        }
        WriteCommands::PackageStatus {
            id,
            status,
            picked_up_by,
        } => render(
            &writer
                .update_package_status(&id, &status, picked_up_by.as_deref())
                .await?,
            format,
        ),
        WriteCommands::InspectionStatus { id, status } => {
            render(&writer.update_inspection_status(&id, &status).await?, format)
        }
        WriteCommands::DueDateStatus { id, status, seen } => render(
            &writer.update_due_date_status(&id, &status, seen).await?,
            format,
        ),
        WriteCommands::DeleteNotice { id } => render(&writer.delete_notice(&id).await?, format),
        WriteCommands::DeleteDueDate { id } => {
            render(&writer.delete_due_date(&id).await?, format)
        }
    }
}

fn render<T: Serialize>(outcome: &WriteOutcome<T>, format: OutputFormat) -> Result<String, SyncError> {
    match (outcome, format) {
        (WriteOutcome::Applied(result), OutputFormat::Json) => {
            to_json(&json!({ "status": "applied", "result": result }))
        }
        (WriteOutcome::Queued(entry), OutputFormat::Json) => {
            to_json(&json!({ "status": "queued", "entry": entry }))
        }
        (WriteOutcome::Applied(_), OutputFormat::Pretty) => Ok(format!("{} Applied", "✓".green())),
        (WriteOutcome::Queued(entry), OutputFormat::Pretty) => Ok(format!(
            "{} Offline, queued {} ({})",
            "○".yellow(),
            entry.label().bold(),
            entry.id.dimmed()
        )),
    }
}
