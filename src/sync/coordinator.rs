//! Sync coordinator.
//!
//! Drains the offline queue against the remote services, one entry at a
//! time and in insertion order, whenever connectivity returns. A pass stops
//! at the first remote failure so no entry is applied ahead of one it may
//! depend on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::connectivity::ConnectivityProbe;
use super::dispatch::Dispatcher;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::offline::{OfflineQueue, PendingMutation};
use crate::remote::RemoteServices;

/// Where the drain state machine is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainState {
    /// No pass running; the last pass, if any, finished cleanly.
    #[default]
    Idle,
    /// A pass is replaying entries.
    Draining,
    /// The last pass stopped on a failed entry.
    Aborted,
}

/// Live status shown by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub pending_count: usize,
    /// True only while a pass is replaying entries
    pub syncing: bool,
    pub dead_letter_count: usize,
    pub state: DrainState,
    /// End of the last pass that emptied the queue
    pub last_sync: Option<DateTime<Utc>>,
    /// Failure that aborted the last pass
    pub last_error: Option<String>,
}

/// Result of one `sync_now` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DrainOutcome {
    /// Not attempted: offline.
    Offline,
    /// Not attempted: another pass is running.
    AlreadySyncing,
    /// Nothing queued.
    Empty,
    /// Every entry in the snapshot was handled.
    Completed {
        replayed: usize,
        dead_lettered: usize,
    },
    /// Stopped at `failed_id`; it and everything after it stay queued.
    Aborted {
        replayed: usize,
        dead_lettered: usize,
        failed_id: String,
        error: String,
    },
}

/// Coordinates connectivity, the offline queue and the remote services.
pub struct SyncCoordinator {
    queue: Arc<OfflineQueue>,
    dispatcher: Dispatcher,
    probe: Arc<dyn ConnectivityProbe>,
    config: SyncConfig,
    draining: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

impl SyncCoordinator {
    #[must_use]
    pub fn new(
        queue: Arc<OfflineQueue>,
        remote: RemoteServices,
        probe: Arc<dyn ConnectivityProbe>,
        config: SyncConfig,
    ) -> Self {
        let initial = SyncStatus {
            is_online: probe.is_online(),
            pending_count: count_or_warn("pending", queue.len()).unwrap_or_default(),
            dead_letter_count: count_or_warn("dead letter", queue.dead_letters().map(|d| d.len()))
                .unwrap_or_default(),
            ..SyncStatus::default()
        };
        let (status, _) = watch::channel(initial);

        Self {
            queue,
            dispatcher: Dispatcher::new(remote),
            probe,
            config,
            draining: AtomicBool::new(false),
            status,
        }
    }

    #[must_use]
    pub const fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    #[must_use]
    pub const fn remote(&self) -> &RemoteServices {
        self.dispatcher.remote()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.probe.is_online()
    }

    /// Snapshot of the current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Re-read pending and dead-letter counts from the store.
    pub fn refresh_counts(&self) {
        let pending = count_or_warn("pending", self.queue.len());
        let dead = count_or_warn("dead letter", self.queue.dead_letters().map(|d| d.len()));
        self.status.send_modify(|s| {
            if let Some(pending) = pending {
                s.pending_count = pending;
            }
            if let Some(dead) = dead {
                s.dead_letter_count = dead;
            }
        });
    }

    fn set_online(&self, online: bool) {
        self.status.send_if_modified(|s| {
            let changed = s.is_online != online;
            s.is_online = online;
            changed
        });
    }

    /// Run one drain pass.
    ///
    /// No-op when offline or when a pass is already running.
    ///
    /// # Errors
    ///
    /// Returns an error only if the queue snapshot cannot be read. Failures
    /// during the pass are reported through [`DrainOutcome::Aborted`].
    pub async fn sync_now(&self) -> Result<DrainOutcome, SyncError> {
        let online = self.probe.is_online();
        self.set_online(online);
        if !online {
            return Ok(DrainOutcome::Offline);
        }

        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Drain already running");
            return Ok(DrainOutcome::AlreadySyncing);
        }
        let _pass = PassGuard { coordinator: self };

        match self.queue.sweep_unreadable() {
            Ok(0) => {}
            Ok(moved) => {
                tracing::warn!(moved, "Moved unreadable queue records to dead letters");
                self.refresh_counts();
            }
            Err(e) => tracing::warn!(error = %e, "Could not sweep unreadable queue records"),
        }

        let snapshot = self.queue.get_queue()?;
        if snapshot.is_empty() {
            return Ok(DrainOutcome::Empty);
        }

        self.status.send_modify(|s| {
            s.syncing = true;
            s.state = DrainState::Draining;
        });
        tracing::info!(entries = snapshot.len(), "Draining offline queue");

        let outcome = self.drain(&snapshot).await;

        self.refresh_counts();
        self.status.send_modify(|s| {
            s.syncing = false;
            match &outcome {
                DrainOutcome::Aborted { error, .. } => {
                    s.state = DrainState::Aborted;
                    s.last_error = Some(error.clone());
                }
                _ => {
                    s.state = DrainState::Idle;
                    s.last_error = None;
                    if s.pending_count == 0 {
                        s.last_sync = Some(Utc::now());
                    }
                }
            }
        });

        match &outcome {
            DrainOutcome::Completed {
                replayed,
                dead_lettered,
            } => tracing::info!(replayed, dead_lettered, "Offline queue drained"),
            DrainOutcome::Aborted {
                replayed,
                failed_id,
                ..
            } => tracing::warn!(replayed, %failed_id, "Drain aborted"),
            _ => {}
        }

        Ok(outcome)
    }

    async fn drain(&self, snapshot: &[PendingMutation]) -> DrainOutcome {
        let mut replayed = 0;
        let mut dead_lettered = 0;

        for entry in snapshot {
            let result = match self.replay(entry).await {
                Ok(()) => self.queue.remove_from_queue(&entry.id).map(|()| replayed += 1),
                Err(e) if e.is_permanent() => self.set_aside(entry, &e).map(|moved| {
                    if moved {
                        dead_lettered += 1;
                    }
                }),
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                tracing::error!(
                    id = %entry.id,
                    label = %entry.label(),
                    error = %e,
                    "Sync failed, stopping pass"
                );
                return DrainOutcome::Aborted {
                    replayed,
                    dead_lettered,
                    failed_id: entry.id.clone(),
                    error: e.to_string(),
                };
            }
        }

        DrainOutcome::Completed {
            replayed,
            dead_lettered,
        }
    }

    async fn replay(&self, entry: &PendingMutation) -> Result<(), SyncError> {
        let call = self.dispatcher.dispatch(entry);
        if self.config.replay_timeout_secs == 0 {
            return call.await;
        }

        let limit = self.config.replay_timeout();
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(SyncError::Timeout(limit.as_secs(), entry.label())))
    }

    /// Handle an entry that can never replay. Returns whether it was moved.
    fn set_aside(&self, entry: &PendingMutation, error: &SyncError) -> Result<bool, SyncError> {
        if self.config.dead_letter_unknown {
            tracing::warn!(id = %entry.id, label = %entry.label(), error = %error, "Moving entry to dead letters");
            self.queue.move_to_dead_letter(entry, &error.to_string())?;
            Ok(true)
        } else {
            tracing::warn!(id = %entry.id, label = %entry.label(), error = %error, "Skipping unprocessable entry");
            Ok(false)
        }
    }

    /// Watch connectivity: drain now if online, then on every
    /// offline-to-online transition.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(self: &Arc<Self>) -> CoordinatorHandle {
        let mut online_rx = self.probe.subscribe();
        let coordinator = Arc::clone(self);

        let watcher = tokio::spawn(async move {
            let mut was_online = *online_rx.borrow_and_update();
            coordinator.set_online(was_online);
            coordinator.refresh_counts();

            if was_online {
                coordinator.spawn_drain();
            }

            while online_rx.changed().await.is_ok() {
                let online = *online_rx.borrow_and_update();
                coordinator.set_online(online);

                if online && !was_online {
                    tracing::info!("Connectivity regained");
                    coordinator.spawn_drain();
                } else if !online && was_online {
                    tracing::info!("Connectivity lost");
                }
                was_online = online;
            }
        });

        CoordinatorHandle { watcher }
    }

    fn spawn_drain(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = coordinator.sync_now().await {
                tracing::error!(error = %e, "Drain could not start");
            }
        });
    }
}

/// Clears the running flag when a pass ends, including when the pass
/// future is dropped mid-flight.
struct PassGuard<'a> {
    coordinator: &'a SyncCoordinator,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.status.send_if_modified(|s| {
            let was_syncing = s.syncing;
            s.syncing = false;
            if s.state == DrainState::Draining {
                s.state = DrainState::Idle;
            }
            was_syncing
        });
        self.coordinator.draining.store(false, Ordering::Release);
    }
}

/// Running connectivity watcher. Dropping it stops watching.
pub struct CoordinatorHandle {
    watcher: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Stop watching connectivity. A pass already running finishes on its own.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// A count that could not be read is logged and left to the caller.
fn count_or_warn(what: &str, count: Result<usize, SyncError>) -> Option<usize> {
    count
        .map_err(|e| tracing::warn!(error = %e, "Could not read {what} count"))
        .ok()
}
