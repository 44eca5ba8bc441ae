//! Configuration management for condosync.
//!
//! This module handles loading configuration from the data directory.

mod paths;
mod settings;

pub use paths::{Paths, HOME_ENV};
pub use settings::{Config, RemoteConfig, SyncConfig};
