//! Write-intent helpers.
//!
//! Every remote write goes through here: online it calls the backend
//! directly, offline it is queued and the caller proceeds optimistically.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::coordinator::SyncCoordinator;
use crate::error::SyncError;
use crate::offline::{
    DueDateStatusPayload, IdPayload, InspectionStatusPayload, Module, PackageStatusPayload,
    PendingMutation, Route,
};

/// What happened to a write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// The backend accepted it.
    Applied(T),
    /// Stored in the offline queue for later replay.
    Queued(PendingMutation),
}

impl<T> WriteOutcome<T> {
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Connectivity-aware writer shared by all call sites.
#[derive(Clone)]
pub struct OfflineWriter {
    coordinator: Arc<SyncCoordinator>,
}

impl OfflineWriter {
    #[must_use]
    pub const fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self { coordinator }
    }

    fn enqueue(&self, route: Route, payload: &impl Serialize) -> Result<PendingMutation, SyncError> {
        let payload = serde_json::to_value(payload)?;
        let entry = self.coordinator.queue().enqueue(
            route.module().as_str(),
            route.action().as_str(),
            payload,
        )?;
        self.coordinator.refresh_counts();
        tracing::info!(id = %entry.id, %route, "Offline, write queued");
        Ok(entry)
    }

    /// Create a record in `module`.
    ///
    /// # Errors
    ///
    /// `SyncError::QueueWrite` if offline and the queue cannot be written,
    /// `SyncError::Remote` if online and the backend rejects the call.
    pub async fn create(
        &self,
        module: Module,
        payload: Value,
    ) -> Result<WriteOutcome<Value>, SyncError> {
        if !self.coordinator.is_online() {
            let route = match module {
                Module::Packages => Route::PackagesCreate,
                Module::Notices => Route::NoticesCreate,
                Module::Inspections => Route::InspectionsCreate,
                Module::DueDates => Route::DueDatesCreate,
            };
            return self.enqueue(route, &payload).map(WriteOutcome::Queued);
        }

        let remote = self.coordinator.remote();
        let created = match module {
            Module::Packages => remote.packages.create(&payload).await?,
            Module::Notices => remote.notices.create(&payload).await?,
            Module::Inspections => remote.inspections.create(&payload).await?,
            Module::DueDates => remote.due_dates.create(&payload).await?,
        };
        Ok(WriteOutcome::Applied(created))
    }

    /// Mark a package as collected or pending.
    ///
    /// # Errors
    ///
    /// See [`OfflineWriter::create`].
    pub async fn update_package_status(
        &self,
        id: &str,
        status: &str,
        picked_up_by: Option<&str>,
    ) -> Result<WriteOutcome<()>, SyncError> {
        if !self.coordinator.is_online() {
            let payload = PackageStatusPayload {
                id: id.to_string(),
                status: status.to_string(),
                picked_up_by: picked_up_by.map(String::from),
            };
            return self
                .enqueue(Route::PackagesUpdateStatus, &payload)
                .map(WriteOutcome::Queued);
        }

        self.coordinator
            .remote()
            .packages
            .update_status(id, status, picked_up_by)
            .await?;
        Ok(WriteOutcome::Applied(()))
    }

    /// Delete a notice.
    ///
    /// # Errors
    ///
    /// See [`OfflineWriter::create`].
    pub async fn delete_notice(&self, id: &str) -> Result<WriteOutcome<()>, SyncError> {
        if !self.coordinator.is_online() {
            let payload = IdPayload { id: id.to_string() };
            return self
                .enqueue(Route::NoticesDelete, &payload)
                .map(WriteOutcome::Queued);
        }

        self.coordinator.remote().notices.delete(id).await?;
        Ok(WriteOutcome::Applied(()))
    }

    /// Change an inspection's status.
    ///
    /// # Errors
    ///
    /// See [`OfflineWriter::create`].
    pub async fn update_inspection_status(
        &self,
        id: &str,
        status: &str,
    ) -> Result<WriteOutcome<()>, SyncError> {
        if !self.coordinator.is_online() {
            let payload = InspectionStatusPayload {
                id: id.to_string(),
                status: status.to_string(),
            };
            return self
                .enqueue(Route::InspectionsUpdateStatus, &payload)
                .map(WriteOutcome::Queued);
        }

        self.coordinator
            .remote()
            .inspections
            .update_status(id, status)
            .await?;
        Ok(WriteOutcome::Applied(()))
    }

    /// Change a due date's status and acknowledgement.
    ///
    /// # Errors
    ///
    /// See [`OfflineWriter::create`].
    pub async fn update_due_date_status(
        &self,
        id: &str,
        status: &str,
        seen: Option<bool>,
    ) -> Result<WriteOutcome<()>, SyncError> {
        if !self.coordinator.is_online() {
            let payload = DueDateStatusPayload {
                id: id.to_string(),
                status: status.to_string(),
                seen,
            };
            return self
                .enqueue(Route::DueDatesUpdateStatus, &payload)
                .map(WriteOutcome::Queued);
        }

        self.coordinator
            .remote()
            .due_dates
            .update_status(id, status, seen)
            .await?;
        Ok(WriteOutcome::Applied(()))
    }

    /// Delete a due date.
    ///
    /// # Errors
    ///
    /// See [`OfflineWriter::create`].
    pub async fn delete_due_date(&self, id: &str) -> Result<WriteOutcome<()>, SyncError> {
        if !self.coordinator.is_online() {
            let payload = IdPayload { id: id.to_string() };
            return self
                .enqueue(Route::DueDatesDelete, &payload)
                .map(WriteOutcome::Queued);
        }

        self.coordinator.remote().due_dates.delete(id).await?;
        Ok(WriteOutcome::Applied(()))
    }
}
