use colored::Colorize;

use crate::offline::{DeadLetter, PendingMutation};
use crate::sync::{DrainOutcome, SyncStatus};

/// Format the pending queue as a numbered list, oldest first
pub fn format_queue_pretty(entries: &[PendingMutation]) -> String {
    if entries.is_empty() {
        return "Offline queue (0 pending)\n  Nothing to sync".to_string();
    }

    let mut output = format!("Offline queue ({} pending)\n", entries.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for (position, entry) in entries.iter().enumerate() {
        let label = if entry.route().is_some() {
            entry.label().bold()
        } else {
            entry.label().red().bold()
        };

        let recorded = entry.recorded_at().map_or_else(
            || entry.timestamp.clone(),
            |at| at.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        output.push_str(&format!(
            "{:>3}. {}  {}  {}\n",
            position + 1,
            label,
            entry.id.dimmed(),
            recorded.dimmed()
        ));
        output.push_str(&format!("     {}\n", entry.payload));
    }

    output
}

/// Format dead letters with the reason each was set aside
pub fn format_dead_letters_pretty(letters: &[DeadLetter]) -> String {
    if letters.is_empty() {
        return "Dead letters (0)\n  None".to_string();
    }

    let mut output = format!("Dead letters ({})\n", letters.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for letter in letters {
        output.push_str(&format!(
            "{} {}  {}\n",
            "✗".red(),
            letter.entry.label().bold(),
            letter.entry.id.dimmed()
        ));
        output.push_str(&format!("  {}\n", letter.reason.yellow()));
    }

    output
}

/// Format coordinator status the way the UI indicator shows it
pub fn format_status_pretty(status: &SyncStatus) -> String {
    let mut lines = vec!["Sync Status".bold().to_string(), "─".repeat(40)];

    lines.push(format!(
        "  Connection: {}",
        if status.is_online {
            "online".green()
        } else {
            "offline".red()
        }
    ));
    lines.push(format!(
        "  Pending:    {}",
        if status.pending_count > 0 {
            status.pending_count.to_string().yellow()
        } else {
            "0".normal()
        }
    ));
    if status.dead_letter_count > 0 {
        lines.push(format!(
            "  Dead:       {}",
            status.dead_letter_count.to_string().red()
        ));
    }
    if status.syncing {
        lines.push(format!("  {}", "Syncing...".cyan()));
    }
    if let Some(last) = status.last_sync {
        lines.push(format!(
            "  Last sync:  {}",
            last.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        ));
    }
    if let Some(error) = &status.last_error {
        lines.push(format!("  Last error: {}", error.red()));
    }

    lines.join("\n")
}

/// Format the result of a drain pass
pub fn format_outcome_pretty(outcome: &DrainOutcome) -> String {
    match outcome {
        DrainOutcome::Offline => format!("{} Offline, nothing was sent", "○".yellow()),
        DrainOutcome::AlreadySyncing => format!("{} A sync is already running", "○".yellow()),
        DrainOutcome::Empty => "No pending operations to sync.".to_string(),
        DrainOutcome::Completed {
            replayed,
            dead_lettered,
        } => {
            let mut line = format!("{} {replayed} synced", "✓".green());
            if *dead_lettered > 0 {
                line.push_str(&format!(", {}", format!("{dead_lettered} dead-lettered").red()));
            }
            line
        }
        DrainOutcome::Aborted {
            replayed,
            failed_id,
            error,
            ..
        } => format!(
            "{} {replayed} synced, stopped at {}\n  {}",
            "✗".red(),
            failed_id.bold(),
            error.red()
        ),
    }
}
