//! Remote service boundary.
//!
//! Each domain module exposes a small capability trait. The sync coordinator
//! only depends on these traits; [`RestClient`] implements all of them
//! against a PostgREST-style backend.

mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use rest::RestClient;

/// Failure reported by a remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Packages received at the front desk.
#[async_trait]
pub trait PackagesApi: Send + Sync {
    async fn create(&self, package: &Value) -> Result<Value, RemoteError>;

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        picked_up_by: Option<&str>,
    ) -> Result<(), RemoteError>;
}

/// Notices posted to residents.
#[async_trait]
pub trait NoticesApi: Send + Sync {
    async fn create(&self, notice: &Value) -> Result<Value, RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// Building inspections.
#[async_trait]
pub trait InspectionsApi: Send + Sync {
    async fn create(&self, inspection: &Value) -> Result<Value, RemoteError>;

    async fn update_status(&self, id: &str, status: &str) -> Result<(), RemoteError>;
}

/// Document and contract due dates.
#[async_trait]
pub trait DueDatesApi: Send + Sync {
    async fn create(&self, due_date: &Value) -> Result<Value, RemoteError>;

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        seen: Option<bool>,
    ) -> Result<(), RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// The set of remote capabilities a replay needs.
#[derive(Clone)]
pub struct RemoteServices {
    pub packages: Arc<dyn PackagesApi>,
    pub notices: Arc<dyn NoticesApi>,
    pub inspections: Arc<dyn InspectionsApi>,
    pub due_dates: Arc<dyn DueDatesApi>,
}

impl RemoteServices {
    /// Use one client for every module.
    #[must_use]
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: PackagesApi + NoticesApi + InspectionsApi + DueDatesApi + 'static,
    {
        Self {
            packages: client.clone(),
            notices: client.clone(),
            inspections: client.clone(),
            due_dates: client,
        }
    }

    /// Services for a machine with no backend configured. Every call fails
    /// with a network error, so replay stops and entries stay queued.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::from_client(Arc::new(Unconfigured))
    }
}

struct Unconfigured;

fn not_configured() -> RemoteError {
    RemoteError::Network("remote.base_url is not set".to_string())
}

#[async_trait]
impl PackagesApi for Unconfigured {
    async fn create(&self, _package: &Value) -> Result<Value, RemoteError> {
        Err(not_configured())
    }

    async fn update_status(
        &self,
        _id: &str,
        _status: &str,
        _picked_up_by: Option<&str>,
    ) -> Result<(), RemoteError> {
        Err(not_configured())
    }
}

#[async_trait]
impl NoticesApi for Unconfigured {
    async fn create(&self, _notice: &Value) -> Result<Value, RemoteError> {
        Err(not_configured())
    }

    async fn delete(&self, _id: &str) -> Result<(), RemoteError> {
        Err(not_configured())
    }
}

#[async_trait]
impl InspectionsApi for Unconfigured {
    async fn create(&self, _inspection: &Value) -> Result<Value, RemoteError> {
        Err(not_configured())
    }

    async fn update_status(&self, _id: &str, _status: &str) -> Result<(), RemoteError> {
        Err(not_configured())
    }
}

#[async_trait]
impl DueDatesApi for Unconfigured {
    async fn create(&self, _due_date: &Value) -> Result<Value, RemoteError> {
        Err(not_configured())
    }

    async fn update_status(
        &self,
        _id: &str,
        _status: &str,
        _seen: Option<bool>,
    ) -> Result<(), RemoteError> {
        Err(not_configured())
    }

    async fn delete(&self, _id: &str) -> Result<(), RemoteError> {
        Err(not_configured())
    }
}
