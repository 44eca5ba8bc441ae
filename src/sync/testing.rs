//! In-memory remote used by the sync tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::offline::Module;
use crate::remote::{
    DueDatesApi, InspectionsApi, NoticesApi, PackagesApi, RemoteError, RemoteServices,
};

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        module: Module,
        payload: Value,
    },
    UpdateStatus {
        module: Module,
        id: String,
        status: String,
        extra: Option<Value>,
    },
    Delete {
        module: Module,
        id: String,
    },
}

/// Records every call in order. Selected calls fail, and calls can be held
/// until released.
#[derive(Default)]
pub struct RecordingRemote {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<usize>>,
    gate: Mutex<Option<Arc<Notify>>>,
    started: Notify,
}

impl RecordingRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn services(self: &Arc<Self>) -> RemoteServices {
        RemoteServices::from_client(Arc::clone(self))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Make the call with this zero-based index reject.
    pub fn fail_call(&self, index: usize) {
        self.failing.lock().unwrap().insert(index);
    }

    /// Hold every call until the returned handle is notified once per call.
    pub fn hold_calls(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Resolves once a call has been recorded.
    pub async fn call_started(&self) {
        self.started.notified().await;
    }

    async fn record(&self, call: Call) -> Result<(), RemoteError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len() - 1
        };
        self.started.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.lock().unwrap().contains(&index) {
            return Err(RemoteError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn record_create(&self, module: Module, payload: &Value) -> Result<Value, RemoteError> {
        self.record(Call::Create {
            module,
            payload: payload.clone(),
        })
        .await?;
        Ok(json!({ "id": "server-generated" }))
    }

    async fn record_update(
        &self,
        module: Module,
        id: &str,
        status: &str,
        extra: Option<Value>,
    ) -> Result<(), RemoteError> {
        self.record(Call::UpdateStatus {
            module,
            id: id.to_string(),
            status: status.to_string(),
            extra,
        })
        .await
    }

    async fn record_delete(&self, module: Module, id: &str) -> Result<(), RemoteError> {
        self.record(Call::Delete {
            module,
            id: id.to_string(),
        })
        .await
    }
}

#[async_trait]
impl PackagesApi for RecordingRemote {
    async fn create(&self, package: &Value) -> Result<Value, RemoteError> {
        self.record_create(Module::Packages, package).await
    }

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        picked_up_by: Option<&str>,
    ) -> Result<(), RemoteError> {
        self.record_update(Module::Packages, id, status, picked_up_by.map(|who| json!(who)))
            .await
    }
}

#[async_trait]
impl NoticesApi for RecordingRemote {
    async fn create(&self, notice: &Value) -> Result<Value, RemoteError> {
        self.record_create(Module::Notices, notice).await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.record_delete(Module::Notices, id).await
    }
}

#[async_trait]
impl InspectionsApi for RecordingRemote {
    async fn create(&self, inspection: &Value) -> Result<Value, RemoteError> {
        self.record_create(Module::Inspections, inspection).await
    }

    async fn update_status(&self, id: &str, status: &str) -> Result<(), RemoteError> {
        self.record_update(Module::Inspections, id, status, None).await
    }
}

#[async_trait]
impl DueDatesApi for RecordingRemote {
    async fn create(&self, due_date: &Value) -> Result<Value, RemoteError> {
        self.record_create(Module::DueDates, due_date).await
    }

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        seen: Option<bool>,
    ) -> Result<(), RemoteError> {
        self.record_update(Module::DueDates, id, status, seen.map(|s| json!(s)))
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.record_delete(Module::DueDates, id).await
    }
}
