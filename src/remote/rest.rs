//! HTTP client for a PostgREST-style backend.
//!
//! Rows live under `{base_url}/rest/v1/{table}`. Client payloads use the
//! web app's field names; they are mapped to column names before insert.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Map, Value};

use super::{DueDatesApi, InspectionsApi, NoticesApi, PackagesApi, RemoteError};
use crate::config::RemoteConfig;
use crate::error::SyncError;
use crate::offline::Module;

const PACKAGE_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("destinatario", "destinatario"),
    ("remetente", "remetente"),
    ("categoria", "categoria"),
    ("caracteristicas", "caracteristicas"),
    ("fotoUrl", "foto_url"),
    ("status", "status"),
    ("sala_id", "sala_id"),
];

const INSPECTION_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("unidade", "unidade"),
    ("local", "local"),
    ("urgencia", "urgencia"),
    ("status", "status"),
    ("tecnico", "tecnico"),
    ("descricao", "descricao"),
    ("fotoUrl", "foto_url"),
];

const DUE_DATE_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("titulo", "titulo"),
    ("dataVencimento", "data_vencimento"),
    ("status", "status"),
    ("visto", "visto"),
];

/// Backend client shared by all modules.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl RestClient {
    /// Build a client from the remote settings.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` if the base URL or key is missing.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, SyncError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| SyncError::Config("remote.base_url is not set".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SyncError::Config("remote.api_key is not set".to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// URL polled to decide whether the backend is reachable.
    #[must_use]
    pub fn health_url(&self) -> String {
        format!("{}/rest/v1/", self.base_url)
    }

    /// Whether the backend answers at all. Any HTTP response counts.
    pub async fn ping(&self) -> bool {
        self.authorized(Method::HEAD, &self.health_url())
            .send()
            .await
            .is_ok()
    }

    fn table_url(&self, module: Module) -> String {
        format!("{}/rest/v1/{}", self.base_url, module.table())
    }

    fn authorized(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn insert(&self, module: Module, row: Value) -> Result<Value, RemoteError> {
        // Rows that carry a client-generated id are upserted so a replay
        // after a crash does not insert twice.
        let prefer = if row.get("id").is_some() {
            "return=representation,resolution=ignore-duplicates"
        } else {
            "return=representation"
        };

        let mut request = self
            .authorized(Method::POST, &self.table_url(module))
            .header("Prefer", prefer)
            .json(&json!([row]));
        if row.get("id").is_some() {
            request = request.query(&[("on_conflict", "id")]);
        }

        let response = check(request.send().await.map_err(network)?).await?;
        let rows: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        Ok(match rows {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            Value::Array(_) => Value::Null,
            other => other,
        })
    }

    async fn update(&self, module: Module, id: &str, patch: Value) -> Result<(), RemoteError> {
        let request = self
            .authorized(Method::PATCH, &self.table_url(module))
            .query(&[("id", format!("eq.{id}"))])
            .json(&patch);
        check(request.send().await.map_err(network)?).await?;
        Ok(())
    }

    async fn remove(&self, module: Module, id: &str) -> Result<(), RemoteError> {
        let request = self
            .authorized(Method::DELETE, &self.table_url(module))
            .query(&[("id", format!("eq.{id}"))]);
        check(request.send().await.map_err(network)?).await?;
        Ok(())
    }
}

fn network(e: reqwest::Error) -> RemoteError {
    RemoteError::Network(e.to_string())
}

async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Copy the mapped fields present in `payload` into a row object.
fn to_row(payload: &Value, columns: &[(&str, &str)]) -> Value {
    let mut row = Map::new();
    for (field, column) in columns {
        if let Some(value) = payload.get(field) {
            row.insert((*column).to_string(), value.clone());
        }
    }
    Value::Object(row)
}

fn package_status_patch(status: &str, picked_up_by: Option<&str>) -> Value {
    let mut patch = json!({ "status": status });
    if let Some(who) = picked_up_by {
        patch["quem_retirou"] = json!(who);
    }
    patch
}

fn due_date_status_patch(status: &str, seen: Option<bool>) -> Value {
    let mut patch = json!({ "status": status });
    if let Some(seen) = seen {
        patch["visto"] = json!(seen);
    }
    patch
}

#[async_trait]
impl PackagesApi for RestClient {
    async fn create(&self, package: &Value) -> Result<Value, RemoteError> {
        self.insert(Module::Packages, to_row(package, PACKAGE_COLUMNS))
            .await
    }

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        picked_up_by: Option<&str>,
    ) -> Result<(), RemoteError> {
        self.update(Module::Packages, id, package_status_patch(status, picked_up_by))
            .await
    }
}

#[async_trait]
impl NoticesApi for RestClient {
    async fn create(&self, notice: &Value) -> Result<Value, RemoteError> {
        self.insert(Module::Notices, notice.clone()).await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.remove(Module::Notices, id).await
    }
}

#[async_trait]
impl InspectionsApi for RestClient {
    async fn create(&self, inspection: &Value) -> Result<Value, RemoteError> {
        self.insert(Module::Inspections, to_row(inspection, INSPECTION_COLUMNS))
            .await
    }

    async fn update_status(&self, id: &str, status: &str) -> Result<(), RemoteError> {
        self.update(Module::Inspections, id, json!({ "status": status }))
            .await
    }
}

#[async_trait]
impl DueDatesApi for RestClient {
    async fn create(&self, due_date: &Value) -> Result<Value, RemoteError> {
        self.insert(Module::DueDates, to_row(due_date, DUE_DATE_COLUMNS))
            .await
    }

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        seen: Option<bool>,
    ) -> Result<(), RemoteError> {
        self.update(Module::DueDates, id, due_date_status_patch(status, seen))
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.remove(Module::DueDates, id).await
    }
}
