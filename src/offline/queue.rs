//! Durable offline queue.
//!
//! The queue is a single JSON array persisted under one key. Every mutation
//! rewrites the whole array through a compare-and-swap on the store, retried
//! until it lands on the value it read. Writers in other processes sharing
//! the same database are therefore never overwritten.
//!
//! Records are decoded one by one. A record that does not decode is moved to
//! the dead-letter list by the next mutation instead of taking the rest of
//! the queue down with it. A value that is not a JSON array at all is copied
//! to a backup key before anything replaces it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::mutation::PendingMutation;
use crate::error::SyncError;
use crate::storage::KeyValueStore;

/// Storage key for pending mutations.
pub const QUEUE_KEY: &str = "offline_queue";

/// Storage key for entries that can never be replayed.
pub const DEAD_LETTER_KEY: &str = "offline_dead_letters";

/// Each losing attempt means another writer's attempt won, so this bounds
/// how far other writers can get ahead, not how long one write takes.
const MAX_ATTEMPTS: usize = 1000;

/// An entry pulled out of the main queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub entry: PendingMutation,
    pub reason: String,
    pub moved_at: DateTime<Utc>,
}

impl DeadLetter {
    fn new(entry: PendingMutation, reason: impl Into<String>) -> Self {
        Self {
            entry,
            reason: reason.into(),
            moved_at: Utc::now(),
        }
    }
}

/// Ordered store of pending mutations.
pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
}

impl OfflineQueue {
    /// Create a queue over a key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All pending entries in insertion order.
    ///
    /// Records that do not decode are skipped; an unreadable value reads as
    /// an empty queue. Neither is modified by reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    pub fn get_queue(&self) -> Result<Vec<PendingMutation>, SyncError> {
        self.read_list(QUEUE_KEY)
    }

    /// Number of pending entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    pub fn len(&self) -> Result<usize, SyncError> {
        Ok(self.get_queue()?.len())
    }

    /// Whether the queue has no pending entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    pub fn is_empty(&self) -> Result<bool, SyncError> {
        Ok(self.len()? == 0)
    }

    /// Append a new entry and persist the queue.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::QueueWrite` if the entry could not be persisted.
    pub fn enqueue(
        &self,
        module: &str,
        action: &str,
        payload: Value,
    ) -> Result<PendingMutation, SyncError> {
        let entry = PendingMutation::new(module, action, payload);
        let record = serde_json::to_value(&entry).map_err(|e| queue_write(e.into()))?;

        self.update_queue(|records| {
            records.push(record.clone());
            Ok(true)
        })
        .map_err(queue_write)?;

        tracing::debug!(id = %entry.id, label = %entry.label(), "Queued offline mutation");
        Ok(entry)
    }

    /// Remove the entry with `id`. Unknown ids leave the queue unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn remove_from_queue(&self, id: &str) -> Result<(), SyncError> {
        self.update_queue(|records| Ok(retain_other_ids(records, id)))
    }

    /// Drop every pending entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn clear_queue(&self) -> Result<(), SyncError> {
        self.store.remove(QUEUE_KEY)
    }

    /// Entries moved out of the queue as unprocessable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    pub fn dead_letters(&self) -> Result<Vec<DeadLetter>, SyncError> {
        self.read_list(DEAD_LETTER_KEY)
    }

    /// Move `entry` from the queue to the dead-letter list.
    ///
    /// The dead-letter list is written first, so a crash in between leaves
    /// the entry in both places rather than losing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn move_to_dead_letter(
        &self,
        entry: &PendingMutation,
        reason: &str,
    ) -> Result<(), SyncError> {
        self.append_dead_letters(&[DeadLetter::new(entry.clone(), reason)])?;
        self.update_queue(|records| Ok(retain_other_ids(records, &entry.id)))
    }

    /// Move records that do not decode to the dead-letter list. Returns how
    /// many were moved.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn sweep_unreadable(&self) -> Result<usize, SyncError> {
        let mut moved = 0;
        self.update(QUEUE_KEY, |records| {
            moved = self.set_aside_unreadable(records)?;
            Ok(moved > 0)
        })?;
        Ok(moved)
    }

    /// Drop every dead letter.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn clear_dead_letters(&self) -> Result<(), SyncError> {
        self.store.remove(DEAD_LETTER_KEY)
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, SyncError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(Vec::new());
        };

        let records = match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(key, error = %e, "Offline data is not a JSON array");
                return Ok(Vec::new());
            }
        };

        Ok(records
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Skipping unreadable offline record");
                    None
                }
            })
            .collect())
    }

    /// Queue mutation that first moves unreadable records aside.
    fn update_queue(
        &self,
        mut apply: impl FnMut(&mut Vec<Value>) -> Result<bool, SyncError>,
    ) -> Result<(), SyncError> {
        self.update(QUEUE_KEY, |records| {
            let moved = self.set_aside_unreadable(records)?;
            Ok(apply(records)? || moved > 0)
        })
    }

    fn set_aside_unreadable(&self, records: &mut Vec<Value>) -> Result<usize, SyncError> {
        let mut letters = Vec::new();
        records.retain(|record| {
            match serde_json::from_value::<PendingMutation>(record.clone()) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Moving unreadable queue record to dead letters");
                    letters.push(DeadLetter::new(
                        PendingMutation::salvage(record),
                        format!("unreadable record: {e}"),
                    ));
                    false
                }
            }
        });

        let moved = letters.len();
        if moved > 0 {
            self.append_dead_letters(&letters)?;
        }
        Ok(moved)
    }

    /// Append letters whose entry id is not already dead-lettered, so a
    /// retried move does not duplicate them.
    fn append_dead_letters(&self, letters: &[DeadLetter]) -> Result<(), SyncError> {
        let records = letters
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        self.update(DEAD_LETTER_KEY, |existing| {
            let mut changed = false;
            for (letter, record) in letters.iter().zip(&records) {
                let present = existing.iter().any(|item| {
                    item.get("entry").and_then(record_id) == Some(letter.entry.id.as_str())
                });
                if !present {
                    existing.push(record.clone());
                    changed = true;
                }
            }
            Ok(changed)
        })
    }

    /// Read-modify-write of the list under `key`. `apply` returns whether
    /// it changed anything; unchanged lists are not written back.
    fn update(
        &self,
        key: &str,
        mut apply: impl FnMut(&mut Vec<Value>) -> Result<bool, SyncError>,
    ) -> Result<(), SyncError> {
        for _ in 0..MAX_ATTEMPTS {
            let current = self.store.get(key)?;
            let mut records = match current.as_deref() {
                None => Vec::new(),
                Some(raw) => match serde_json::from_str::<Vec<Value>>(raw) {
                    Ok(records) => records,
                    Err(e) => {
                        self.back_up(key, raw, &e)?;
                        Vec::new()
                    }
                },
            };

            if !apply(&mut records)? {
                return Ok(());
            }

            let next = serde_json::to_string(&records)?;
            if self.store.compare_and_swap(key, current, Some(next))? {
                return Ok(());
            }
            tracing::debug!(key, "Concurrent write, retrying");
        }

        Err(SyncError::Database(format!(
            "Gave up writing {key} after {MAX_ATTEMPTS} concurrent writes"
        )))
    }

    fn back_up(&self, key: &str, raw: &str, error: &serde_json::Error) -> Result<(), SyncError> {
        let backup = format!("{key}.corrupt.{}", Utc::now().timestamp_millis());
        tracing::warn!(key, %backup, %error, "Offline data is not a JSON array, backing it up");
        self.store.set(&backup, raw)
    }
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Drop records with `id`. Returns whether any were dropped.
fn retain_other_ids(records: &mut Vec<Value>, id: &str) -> bool {
    let before = records.len();
    records.retain(|record| record_id(record) != Some(id));
    records.len() != before
}

fn queue_write(e: SyncError) -> SyncError {
    match e {
        SyncError::QueueWrite(_) => e,
        other => SyncError::QueueWrite(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, MemoryKvStore, MockKeyValueStore, SqliteKvStore};
    use serde_json::json;

    fn create_test_queue() -> OfflineQueue {
        OfflineQueue::new(Arc::new(MemoryKvStore::new()))
    }

    #[test]
    fn test_empty_queue() {
        let queue = create_test_queue();
        assert!(queue.get_queue().unwrap().is_empty());
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_enqueue_preserves_order() {
        let queue = create_test_queue();

        let first = queue
            .enqueue("packages", "create", json!({"destinatario": "Unit 101"}))
            .unwrap();
        let second = queue
            .enqueue("packages", "updateStatus", json!({"id": "p-1", "status": "Retirado"}))
            .unwrap();
        let third = queue.enqueue("notices", "delete", json!({"id": "n-9"})).unwrap();

        let ids: Vec<_> = queue.get_queue().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn test_remove_from_queue() {
        let queue = create_test_queue();

        let a = queue.enqueue("notices", "create", json!({"titulo": "A"})).unwrap();
        let b = queue.enqueue("notices", "create", json!({"titulo": "B"})).unwrap();

        queue.remove_from_queue(&a.id).unwrap();

        assert_eq!(queue.get_queue().unwrap(), vec![b]);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let queue = create_test_queue();
        let a = queue.enqueue("notices", "create", json!({"titulo": "A"})).unwrap();

        queue.remove_from_queue("does-not-exist").unwrap();

        assert_eq!(queue.get_queue().unwrap(), vec![a]);
    }

    #[test]
    fn test_clear_queue() {
        let queue = create_test_queue();
        queue.enqueue("notices", "create", json!({})).unwrap();
        queue.enqueue("notices", "create", json!({})).unwrap();

        queue.clear_queue().unwrap();

        assert!(queue.get_queue().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_data_reads_as_empty() {
        let store = Arc::new(MemoryKvStore::new());
        store.set(QUEUE_KEY, "{not json").unwrap();
        let queue = OfflineQueue::new(store);

        assert!(queue.get_queue().unwrap().is_empty());

        queue.enqueue("packages", "create", json!({})).unwrap();
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_data_is_backed_up_before_overwrite() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .returning(|_| Ok(Some("{not json".to_string())));
        store
            .expect_set()
            .withf(|key, value| key.starts_with("offline_queue.corrupt.") && value == "{not json")
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_compare_and_swap()
            .withf(|key, expected, _| key == QUEUE_KEY && expected.as_deref() == Some("{not json"))
            .times(1)
            .returning(|_, _, _| Ok(true));

        let queue = OfflineQueue::new(Arc::new(store));
        queue.enqueue("packages", "create", json!({})).unwrap();
    }

    #[test]
    fn test_reads_records_from_other_clients() {
        let store = Arc::new(MemoryKvStore::new());
        store
            .set(
                QUEUE_KEY,
                r#"[
                    {"id": "a", "module": "packages", "action": "create",
                     "payload": {"destinatario": "Unit 101"}, "timestamp": "2024-05-01T12:30:00.000Z"},
                    {"id": "b", "module": "notices", "action": "delete",
                     "payload": {"id": "n-1"}, "timestamp": "2024-05-01T12:31:00.000"}
                ]"#,
            )
            .unwrap();
        let queue = OfflineQueue::new(store);

        let c = queue.enqueue("notices", "create", json!({})).unwrap();

        let ids: Vec<_> = queue.get_queue().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string(), c.id]);
        assert!(queue.dead_letters().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_record_moves_to_dead_letters() {
        let store = Arc::new(MemoryKvStore::new());
        store
            .set(
                QUEUE_KEY,
                r#"[
                    {"id": "bad", "module": 7, "action": "create"},
                    {"id": "good", "module": "notices", "action": "delete", "payload": {"id": "n-1"}}
                ]"#,
            )
            .unwrap();
        let queue = OfflineQueue::new(store);

        let ids: Vec<_> = queue.get_queue().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["good".to_string()]);
        assert!(queue.dead_letters().unwrap().is_empty());

        let added = queue.enqueue("packages", "create", json!({})).unwrap();

        let ids: Vec<_> = queue.get_queue().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["good".to_string(), added.id]);

        let letters = queue.dead_letters().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].entry.id, "bad");
        assert_eq!(letters[0].entry.payload["module"], 7);
        assert!(letters[0].reason.starts_with("unreadable record"));
    }

    #[test]
    fn test_sweep_unreadable() {
        let store = Arc::new(MemoryKvStore::new());
        store
            .set(QUEUE_KEY, r#"[{"id": "bad"}, {"id": "ok", "module": "notices", "action": "create"}]"#)
            .unwrap();
        let queue = OfflineQueue::new(store);

        assert_eq!(queue.sweep_unreadable().unwrap(), 1);
        assert_eq!(queue.sweep_unreadable().unwrap(), 0);
        assert_eq!(queue.len().unwrap(), 1);
        assert_eq!(queue.dead_letters().unwrap().len(), 1);
    }

    #[test]
    fn test_survives_restart() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("queue.db");

        let entry = {
            let store = SqliteKvStore::new(Database::open_at(&db_path).unwrap());
            let queue = OfflineQueue::new(Arc::new(store));
            queue
                .enqueue("packages", "create", json!({"destinatario": "Unit 101", "sala_id": "s-1"}))
                .unwrap()
        };

        let store = SqliteKvStore::new(Database::open_at(&db_path).unwrap());
        let queue = OfflineQueue::new(Arc::new(store));

        assert_eq!(queue.get_queue().unwrap(), vec![entry]);
    }

    #[test]
    fn test_concurrent_writers_on_one_database() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("queue.db");
        let queues: Vec<_> = (0..2)
            .map(|_| {
                let store = SqliteKvStore::new(Database::open_at(&db_path).unwrap());
                OfflineQueue::new(Arc::new(store))
            })
            .collect();

        std::thread::scope(|scope| {
            for (n, queue) in queues.iter().enumerate() {
                scope.spawn(move || {
                    for i in 0..200 {
                        queue
                            .enqueue("notices", "create", json!({"writer": n, "seq": i}))
                            .unwrap();
                    }
                });
            }
        });

        let entries = queues[0].get_queue().unwrap();
        assert_eq!(entries.len(), 400);
        for writer in 0..2 {
            let seqs: Vec<_> = entries
                .iter()
                .filter(|e| e.payload["writer"] == writer)
                .map(|e| e.payload["seq"].as_i64().unwrap())
                .collect();
            assert_eq!(seqs, (0..200).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_enqueue_retries_after_lost_swap() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().returning(|_| Ok(None));
        let mut seq = mockall::Sequence::new();
        store
            .expect_compare_and_swap()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(false));
        store
            .expect_compare_and_swap()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(true));

        let queue = OfflineQueue::new(Arc::new(store));
        queue.enqueue("packages", "create", json!({})).unwrap();
    }

    #[test]
    fn test_enqueue_write_failure() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_compare_and_swap()
            .returning(|_, _, _| Err(SyncError::Database("disk full".to_string())));

        let queue = OfflineQueue::new(Arc::new(store));
        let err = queue.enqueue("packages", "create", json!({})).unwrap_err();

        assert!(matches!(err, SyncError::QueueWrite(msg) if msg.contains("disk full")));
    }

    #[test]
    fn test_remove_unknown_id_does_not_write() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().returning(|_| Ok(Some("[]".to_string())));
        store.expect_set().never();
        store.expect_compare_and_swap().never();

        let queue = OfflineQueue::new(Arc::new(store));
        queue.remove_from_queue("missing").unwrap();
    }

    #[test]
    fn test_move_to_dead_letter() {
        let queue = create_test_queue();

        let bad = queue.enqueue("lobby", "create", json!({})).unwrap();
        let good = queue.enqueue("notices", "create", json!({})).unwrap();

        queue.move_to_dead_letter(&bad, "unknown route").unwrap();
        // a retried move does not duplicate the letter
        queue.move_to_dead_letter(&bad, "unknown route").unwrap();

        assert_eq!(queue.get_queue().unwrap(), vec![good]);

        let letters = queue.dead_letters().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].entry, bad);
        assert_eq!(letters[0].reason, "unknown route");

        queue.clear_dead_letters().unwrap();
        assert!(queue.dead_letters().unwrap().is_empty());
    }
}
