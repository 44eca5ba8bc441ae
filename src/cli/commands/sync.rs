//! Status and sync command implementation.

use colored::Colorize;

use crate::cli::args::{OutputFormat, SyncCommands};
use crate::error::SyncError;
use crate::output::{format_outcome, format_status, to_json};
use crate::sync::SyncCoordinator;

use super::Environment;

/// Show connection state and queue counts.
///
/// # Errors
///
/// Returns an error if the coordinator cannot be built.
pub async fn status(env: &Environment, format: OutputFormat) -> Result<String, SyncError> {
    let coordinator = env.coordinator().await?;
    format_status(&coordinator.status(), format)
}

/// Execute sync subcommands.
///
/// # Errors
///
/// Returns an error if the coordinator cannot be built or the queue cannot
/// be read.
pub async fn sync(
    env: &Environment,
    cmd: SyncCommands,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let coordinator = env.coordinator().await?;

    match cmd {
        SyncCommands::Run => {
            let outcome = coordinator.sync_now().await?;
            format_outcome(&outcome, format)
        }
        SyncCommands::Watch => watch(&coordinator, format).await,
    }
}

/// Drain on start and on every reconnect, printing each status change,
/// until Ctrl-C.
async fn watch(
    coordinator: &std::sync::Arc<SyncCoordinator>,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let mut updates = coordinator.subscribe();
    let handle = coordinator.start();
    tracing::info!("Watching connectivity, press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                println!("{}", format_status(&snapshot, format)?);
            }
        }
    }

    handle.shutdown();
    let status = coordinator.status();
    match format {
        OutputFormat::Json => to_json(&status),
        OutputFormat::Pretty => Ok(format!(
            "{} Stopped with {} pending",
            "■".dimmed(),
            status.pending_count
        )),
    }
}
