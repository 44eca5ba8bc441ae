//! Maps queue entries to remote calls.
//!
//! The `match` over [`Route`] is the dispatch table; adding a route without a
//! handler fails to compile.

use crate::error::SyncError;
use crate::offline::{
    DueDateStatusPayload, IdPayload, InspectionStatusPayload, PackageStatusPayload,
    PendingMutation, Route,
};
use crate::remote::RemoteServices;

/// Replays queue entries against the remote services.
#[derive(Clone)]
pub struct Dispatcher {
    remote: RemoteServices,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(remote: RemoteServices) -> Self {
        Self { remote }
    }

    #[must_use]
    pub const fn remote(&self) -> &RemoteServices {
        &self.remote
    }

    /// Issue the remote call for `entry`.
    ///
    /// # Errors
    ///
    /// `SyncError::DeadLetter` for unknown routes or malformed payloads,
    /// `SyncError::Remote` when the backend rejects the call.
    pub async fn dispatch(&self, entry: &PendingMutation) -> Result<(), SyncError> {
        let route = entry.route().ok_or_else(|| SyncError::DeadLetter {
            module: entry.module.clone(),
            action: entry.action.clone(),
            reason: "no handler for this module/action".to_string(),
        })?;

        let remote = &self.remote;
        match route {
            Route::PackagesCreate => {
                remote.packages.create(&entry.payload).await?;
            }
            Route::PackagesUpdateStatus => {
                let p: PackageStatusPayload = entry.decode()?;
                remote
                    .packages
                    .update_status(&p.id, &p.status, p.picked_up_by.as_deref())
                    .await?;
            }
            Route::NoticesCreate => {
                remote.notices.create(&entry.payload).await?;
            }
            Route::NoticesDelete => {
                let p: IdPayload = entry.decode()?;
                remote.notices.delete(&p.id).await?;
            }
            Route::InspectionsCreate => {
                remote.inspections.create(&entry.payload).await?;
            }
            Route::InspectionsUpdateStatus => {
                let p: InspectionStatusPayload = entry.decode()?;
                remote.inspections.update_status(&p.id, &p.status).await?;
            }
            Route::DueDatesCreate => {
                remote.due_dates.create(&entry.payload).await?;
            }
            Route::DueDatesUpdateStatus => {
                let p: DueDateStatusPayload = entry.decode()?;
                remote
                    .due_dates
                    .update_status(&p.id, &p.status, p.seen)
                    .await?;
            }
            Route::DueDatesDelete => {
                let p: IdPayload = entry.decode()?;
                remote.due_dates.delete(&p.id).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::Module;
    use crate::remote::RemoteError;
    use crate::sync::testing::{Call, RecordingRemote};
    use serde_json::json;

    fn dispatcher() -> (Dispatcher, std::sync::Arc<RecordingRemote>) {
        let remote = RecordingRemote::new();
        (Dispatcher::new(remote.services()), remote)
    }

    #[tokio::test]
    async fn test_create_forwards_payload_verbatim() {
        let (dispatcher, remote) = dispatcher();
        let payload = json!({"destinatario": "Unit 101", "categoria": "Caixa"});

        dispatcher
            .dispatch(&PendingMutation::new("packages", "create", payload.clone()))
            .await
            .unwrap();

        assert_eq!(
            remote.calls(),
            vec![Call::Create {
                module: Module::Packages,
                payload
            }]
        );
    }

    #[tokio::test]
    async fn test_package_status_passes_discrete_arguments() {
        let (dispatcher, remote) = dispatcher();

        dispatcher
            .dispatch(&PendingMutation::new(
                "packages",
                "updateStatus",
                json!({"id": "p-7", "status": "Retirado", "quemRetirou": "Bruno"}),
            ))
            .await
            .unwrap();

        assert_eq!(
            remote.calls(),
            vec![Call::UpdateStatus {
                module: Module::Packages,
                id: "p-7".to_string(),
                status: "Retirado".to_string(),
                extra: Some(json!("Bruno")),
            }]
        );
    }

    #[tokio::test]
    async fn test_due_date_status_and_delete() {
        let (dispatcher, remote) = dispatcher();

        dispatcher
            .dispatch(&PendingMutation::new(
                "duedates",
                "updateStatus",
                json!({"id": "d-1", "status": "Feito", "visto": true}),
            ))
            .await
            .unwrap();
        dispatcher
            .dispatch(&PendingMutation::new("duedates", "delete", json!({"id": "d-2"})))
            .await
            .unwrap();

        assert_eq!(
            remote.calls(),
            vec![
                Call::UpdateStatus {
                    module: Module::DueDates,
                    id: "d-1".to_string(),
                    status: "Feito".to_string(),
                    extra: Some(json!(true)),
                },
                Call::Delete {
                    module: Module::DueDates,
                    id: "d-2".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_inspection_status_and_notice_delete() {
        let (dispatcher, remote) = dispatcher();

        dispatcher
            .dispatch(&PendingMutation::new(
                "inspections",
                "updateStatus",
                json!({"id": "i-1", "status": "Concluído"}),
            ))
            .await
            .unwrap();
        dispatcher
            .dispatch(&PendingMutation::new("notices", "delete", json!({"id": "n-1"})))
            .await
            .unwrap();

        assert_eq!(
            remote.calls(),
            vec![
                Call::UpdateStatus {
                    module: Module::Inspections,
                    id: "i-1".to_string(),
                    status: "Concluído".to_string(),
                    extra: None,
                },
                Call::Delete {
                    module: Module::Notices,
                    id: "n-1".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_dead_letter() {
        let (dispatcher, remote) = dispatcher();

        let err = dispatcher
            .dispatch(&PendingMutation::new("rooms", "create", json!({})))
            .await
            .unwrap_err();

        assert!(err.is_permanent());
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_transient() {
        let (dispatcher, remote) = dispatcher();
        remote.fail_call(0);

        let err = dispatcher
            .dispatch(&PendingMutation::new("notices", "create", json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Remote(RemoteError::Status { .. })));
        assert!(!err.is_permanent());
    }
}
