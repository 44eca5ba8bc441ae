//! condosync - offline write queue for a building management backend
//!
//! Writes made while the backend is unreachable are persisted in a local
//! queue and replayed in insertion order when connectivity returns.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod offline;
pub mod output;
pub mod remote;
pub mod storage;
pub mod sync;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::SyncError;
pub use offline::{OfflineQueue, PendingMutation};
pub use sync::{OfflineWriter, SyncCoordinator};
