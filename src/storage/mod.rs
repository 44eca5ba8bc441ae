//! Storage layer for condosync.
//!
//! This module provides SQLite-based persistence for the offline queue
//! behind a small key-value interface.

mod database;
mod kv;
mod migrations;

pub use database::Database;
#[cfg(test)]
pub use kv::MockKeyValueStore;
pub use kv::{KeyValueStore, MemoryKvStore, SqliteKvStore};
