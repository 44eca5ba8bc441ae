//! Command-line interface for condosync.

pub mod args;
pub mod commands;
