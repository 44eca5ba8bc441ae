//! Command implementations for condosync.
//!
//! Queue inspection works from the local store alone. Writes, status and
//! sync build a [`SyncCoordinator`] wired to the configured backend.

mod queue;
mod sync;
mod write;

use std::sync::Arc;

pub use queue::{dead_letter, queue};
pub use sync::{status, sync};
pub use write::write;

use crate::config::Config;
use crate::error::SyncError;
use crate::offline::OfflineQueue;
use crate::remote::{RemoteServices, RestClient};
use crate::storage::SqliteKvStore;
use crate::sync::{ConnectivityProbe, HttpConnectivity, ManualConnectivity, SyncCoordinator};

/// Global options every command shares.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub offline: bool,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Environment {
    /// Load the config file and apply command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be parsed.
    pub fn config(&self) -> Result<Config, SyncError> {
        let mut config = Config::load()?;
        if let Some(url) = &self.base_url {
            config.remote.base_url = Some(url.clone());
        }
        if let Some(key) = &self.api_key {
            config.remote.api_key = Some(key.clone());
        }
        Ok(config)
    }

    /// Open the persistent queue in the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_queue(&self) -> Result<Arc<OfflineQueue>, SyncError> {
        let store = SqliteKvStore::open()?;
        Ok(Arc::new(OfflineQueue::new(Arc::new(store))))
    }

    /// Build a coordinator over the persistent queue.
    ///
    /// With no backend configured, or with `--offline`, connectivity is
    /// pinned to offline. Otherwise the backend is probed on the configured
    /// interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the backend is
    /// only partially configured.
    pub async fn coordinator(&self) -> Result<Arc<SyncCoordinator>, SyncError> {
        let config = self.config()?;
        let queue = self.open_queue()?;

        let (remote, probe) = if let Some(url) = &config.remote.base_url {
            let client = RestClient::from_config(&config.remote)?;
            let probe: Arc<dyn ConnectivityProbe> = if self.offline {
                Arc::new(ManualConnectivity::new(false))
            } else {
                tracing::debug!(%url, "Probing backend");
                Arc::new(HttpConnectivity::start(client.clone(), config.sync.probe_interval()).await)
            };
            (RemoteServices::from_client(Arc::new(client)), probe)
        } else {
            tracing::debug!("No backend configured, running offline");
            let probe: Arc<dyn ConnectivityProbe> = Arc::new(ManualConnectivity::new(false));
            (RemoteServices::unconfigured(), probe)
        };

        Ok(Arc::new(SyncCoordinator::new(
            queue,
            remote,
            probe,
            config.sync,
        )))
    }
}
