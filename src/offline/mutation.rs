//! Queued mutation records and the routes they replay to.
//!
//! `module` and `action` stay plain strings on the persisted record so
//! entries written by other clients always load; [`Route`] is the closed set
//! the coordinator knows how to replay.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SyncError;

/// A deferred write waiting in the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    /// Removal key, generated at enqueue time
    pub id: String,
    /// Target collection, e.g. `packages`
    pub module: String,
    /// Operation name, e.g. `updateStatus`
    pub action: String,
    /// Forwarded to the remote operation as-is
    #[serde(default)]
    pub payload: Value,
    /// Informational; queue order is insertion order. Stored as written,
    /// since other clients may omit the UTC offset.
    #[serde(default)]
    pub timestamp: String,
}

impl PendingMutation {
    /// Create a new entry with a fresh id and the current time.
    #[must_use]
    pub fn new(module: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            module: module.into(),
            action: action.into(),
            payload,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Rebuild an entry from a persisted record that does not decode. The
    /// raw record becomes the payload so nothing in it is lost.
    #[must_use]
    pub fn salvage(raw: &Value) -> Self {
        let text = |field: &str| raw.get(field).and_then(Value::as_str).map(String::from);
        Self {
            id: text("id").unwrap_or_else(|| Uuid::new_v4().to_string()),
            module: text("module").unwrap_or_default(),
            action: text("action").unwrap_or_default(),
            payload: raw.clone(),
            timestamp: text("timestamp").unwrap_or_default(),
        }
    }

    /// When the entry was recorded. Timestamps without an offset are read
    /// as UTC.
    #[must_use]
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(at) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(at.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// `module:action`, used in logs and error messages.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}:{}", self.module, self.action)
    }

    /// The replay route for this entry, if the pair is recognised.
    #[must_use]
    pub fn route(&self) -> Option<Route> {
        Route::resolve(&self.module, &self.action)
    }

    /// Decode the payload into a route-specific shape.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::DeadLetter` when the payload does not match; such
    /// an entry can never succeed.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| SyncError::DeadLetter {
            module: self.module.clone(),
            action: self.action.clone(),
            reason: format!("invalid payload: {e}"),
        })
    }
}

/// Domain collections that accept offline writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    /// Packages received at the front desk
    Packages,
    /// Notices posted to residents
    Notices,
    /// Building inspections
    Inspections,
    /// Document and contract due dates
    DueDates,
}

impl Module {
    /// All modules, in display order.
    pub const ALL: [Self; 4] = [
        Self::Packages,
        Self::Notices,
        Self::Inspections,
        Self::DueDates,
    ];

    /// Name written into queue entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Packages => "packages",
            Self::Notices => "notices",
            Self::Inspections => "inspections",
            Self::DueDates => "duedates",
        }
    }

    /// Backend table the module writes to.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Packages => "encomendas",
            Self::Notices => "avisos",
            Self::Inspections => "vistorias",
            Self::DueDates => "vencimentos",
        }
    }

    /// Parse a module name. Table names written by the web client are
    /// accepted as aliases.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "packages" | "encomendas" => Some(Self::Packages),
            "notices" | "avisos" => Some(Self::Notices),
            "inspections" | "vistorias" => Some(Self::Inspections),
            "duedates" | "due_dates" | "vencimentos" => Some(Self::DueDates),
            _ => None,
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operations a queue entry can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Create,
    UpdateStatus,
    Delete,
}

impl Action {
    /// Name written into queue entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::UpdateStatus => "updateStatus",
            Self::Delete => "delete",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "updateStatus" | "update_status" => Some(Self::UpdateStatus),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recognised `(module, action)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    PackagesCreate,
    PackagesUpdateStatus,
    NoticesCreate,
    NoticesDelete,
    InspectionsCreate,
    InspectionsUpdateStatus,
    DueDatesCreate,
    DueDatesUpdateStatus,
    DueDatesDelete,
}

impl Route {
    /// Every replayable pair.
    pub const ALL: [Self; 9] = [
        Self::PackagesCreate,
        Self::PackagesUpdateStatus,
        Self::NoticesCreate,
        Self::NoticesDelete,
        Self::InspectionsCreate,
        Self::InspectionsUpdateStatus,
        Self::DueDatesCreate,
        Self::DueDatesUpdateStatus,
        Self::DueDatesDelete,
    ];

    #[must_use]
    pub const fn module(self) -> Module {
        match self {
            Self::PackagesCreate | Self::PackagesUpdateStatus => Module::Packages,
            Self::NoticesCreate | Self::NoticesDelete => Module::Notices,
            Self::InspectionsCreate | Self::InspectionsUpdateStatus => Module::Inspections,
            Self::DueDatesCreate | Self::DueDatesUpdateStatus | Self::DueDatesDelete => {
                Module::DueDates
            }
        }
    }

    #[must_use]
    pub const fn action(self) -> Action {
        match self {
            Self::PackagesCreate
            | Self::NoticesCreate
            | Self::InspectionsCreate
            | Self::DueDatesCreate => Action::Create,
            Self::PackagesUpdateStatus
            | Self::InspectionsUpdateStatus
            | Self::DueDatesUpdateStatus => Action::UpdateStatus,
            Self::NoticesDelete | Self::DueDatesDelete => Action::Delete,
        }
    }

    /// Find the route for a module/action pair.
    #[must_use]
    pub fn from_parts(module: Module, action: Action) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|route| route.module() == module && route.action() == action)
    }

    /// Resolve the raw strings stored on a queue entry.
    #[must_use]
    pub fn resolve(module: &str, action: &str) -> Option<Self> {
        Self::from_parts(Module::parse(module)?, Action::parse(action)?)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.module(), self.action())
    }
}

/// Payload for delete operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPayload {
    pub id: String,
}

/// Payload for `packages:updateStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStatusPayload {
    pub id: String,
    pub status: String,
    /// Who collected the package
    #[serde(
        rename = "quemRetirou",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub picked_up_by: Option<String>,
}

/// Payload for `inspections:updateStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionStatusPayload {
    pub id: String,
    pub status: String,
}

/// Payload for `duedates:updateStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDateStatusPayload {
    pub id: String,
    pub status: String,
    /// Acknowledged by the manager
    #[serde(rename = "visto", default, skip_serializing_if = "Option::is_none")]
    pub seen: Option<bool>,
}
