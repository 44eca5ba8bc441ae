use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "condosync")]
#[command(about = "Offline write queue and sync for the building management backend")]
#[command(long_about = "condosync - offline write queue for the building management backend

Writes made while the backend is unreachable are queued locally and replayed
in order once connectivity returns. A failed replay stops the pass and leaves
the rest of the queue for the next attempt.

QUICK START:
  condosync status                         Show connection and pending count
  condosync queue list                     List queued writes, oldest first
  condosync write create packages '{...}'  Create a record (queued if offline)
  condosync sync run                       Replay the queue once
  condosync sync watch                     Replay on every reconnect until Ctrl-C

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub output: OutputFormat,

    /// Treat the backend as unreachable
    ///
    /// Writes are queued and sync passes return immediately.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Backend base URL, overriding remote.base_url
    #[arg(long, env = "CONDOSYNC_URL", global = true, hide_env_values = true)]
    pub base_url: Option<String>,

    /// Backend API key, overriding remote.api_key
    #[arg(long, env = "CONDOSYNC_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or edit the offline queue
    #[command(alias = "q")]
    Queue(QueueArgs),

    /// Inspect entries that could never be replayed
    #[command(name = "dead-letter", alias = "dl")]
    DeadLetter(DeadLetterArgs),

    /// Perform a write, queueing it when offline
    ///
    /// Online, the backend is called directly and errors are reported.
    /// Offline, the write is queued for the next sync pass.
    #[command(alias = "w")]
    Write(WriteArgs),

    /// Show connection state and queue counts
    Status,

    /// Replay queued writes
    Sync(SyncArgs),
}

#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommands,
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List queued writes, oldest first
    #[command(alias = "ls")]
    List,

    /// Append a raw entry
    ///
    /// The module and action are stored as given. Entries with an unknown
    /// route are set aside as dead letters when replayed.
    ///
    /// # Examples
    ///
    ///   condosync queue add notices delete '{"id": "n-1"}'
    ///   condosync queue add encomendas create '{"destinatario": "Apto 101"}'
    Add {
        /// Module name (packages, notices, inspections, duedates)
        module: String,
        /// Action name (create, updateStatus, delete)
        action: String,
        /// Payload as a JSON object
        payload: String,
    },

    /// Remove one entry by id
    #[command(alias = "rm")]
    Remove {
        /// Entry id
        id: String,
    },

    /// Remove every queued entry
    Clear,
}

#[derive(Args)]
pub struct DeadLetterArgs {
    #[command(subcommand)]
    pub command: DeadLetterCommands,
}

#[derive(Subcommand)]
pub enum DeadLetterCommands {
    /// List dead letters with the reason each was set aside
    #[command(alias = "ls")]
    List,

    /// Discard all dead letters
    Clear,
}

#[derive(Args)]
pub struct WriteArgs {
    #[command(subcommand)]
    pub command: WriteCommands,
}

#[derive(Subcommand)]
pub enum WriteCommands {
    /// Create a record
    Create {
        /// Module name (packages, notices, inspections, duedates)
        module: String,
        /// Record as a JSON object
        payload: String,
    },

    /// Set a package's status
    PackageStatus {
        id: String,
        status: String,
        /// Who collected the package
        #[arg(long)]
        picked_up_by: Option<String>,
    },

    /// Set an inspection's status
    InspectionStatus { id: String, status: String },

    /// Set a due date's status
    DueDateStatus {
        id: String,
        status: String,
        /// Mark the due date as acknowledged
        #[arg(long)]
        seen: Option<bool>,
    },

    /// Delete a notice
    DeleteNotice { id: String },

    /// Delete a due date
    DeleteDueDate { id: String },
}

#[derive(Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommands,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run a single pass over the queue
    Run,

    /// Watch connectivity and replay on every reconnect until Ctrl-C
    Watch,
}
