//! Synchronization of the offline queue with the remote backend.
//!
//! - [`ConnectivityProbe`] reports online/offline transitions
//! - [`Dispatcher`] maps each queued `(module, action)` to a remote call
//! - [`SyncCoordinator`] drains the queue in order and publishes status
//! - [`OfflineWriter`] decides per write whether to call or to queue

pub mod connectivity;
pub mod coordinator;
pub mod dispatch;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use connectivity::{ConnectivityProbe, HttpConnectivity, ManualConnectivity};
pub use coordinator::{CoordinatorHandle, DrainOutcome, DrainState, SyncCoordinator, SyncStatus};
pub use dispatch::Dispatcher;
pub use writer::{OfflineWriter, WriteOutcome};
