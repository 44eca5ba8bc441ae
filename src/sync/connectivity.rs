//! Connectivity detection.
//!
//! A probe answers "are we online right now" and publishes transitions on a
//! `watch` channel. Dropping the receiver is the unsubscribe.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::remote::RestClient;

/// Shortest interval the backend is polled at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Source of online/offline state.
pub trait ConnectivityProbe: Send + Sync {
    /// Current state.
    fn is_online(&self) -> bool;

    /// Receiver that observes every transition.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Probe whose state is set explicitly: the `--offline` flag, host
/// integrations that already know the network state, and tests.
#[derive(Debug)]
pub struct ManualConnectivity {
    state: watch::Sender<bool>,
}

impl ManualConnectivity {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self { state }
    }

    /// Record a transition. Setting the current value again notifies nobody.
    pub fn set_online(&self, online: bool) {
        self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl ConnectivityProbe for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

/// Probe that polls the backend on an interval.
pub struct HttpConnectivity {
    state: Arc<watch::Sender<bool>>,
    poller: JoinHandle<()>,
}

impl HttpConnectivity {
    /// Check once, then keep polling in the background until dropped.
    pub async fn start(client: RestClient, interval: Duration) -> Self {
        let initial = client.ping().await;
        let (state, _) = watch::channel(initial);
        let state = Arc::new(state);

        let publisher = Arc::clone(&state);
        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick fires immediately and the initial state is known
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let online = client.ping().await;
                publisher.send_if_modified(|current| {
                    if *current == online {
                        false
                    } else {
                        tracing::info!(online, "Backend reachability changed");
                        *current = online;
                        true
                    }
                });
            }
        });

        Self { state, poller }
    }
}

impl ConnectivityProbe for HttpConnectivity {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Drop for HttpConnectivity {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    /// Answer every request with an empty 200 until aborted.
    async fn serve_ok(listener: TcpListener) {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
            let _ = socket.shutdown().await;
        }
    }

    #[test]
    fn test_manual_state() {
        let probe = ManualConnectivity::new(false);
        assert!(!probe.is_online());

        probe.set_online(true);
        assert!(probe.is_online());
    }

    #[test]
    fn test_manual_without_subscribers() {
        let probe = ManualConnectivity::new(true);
        // no receiver alive; the value must still update
        probe.set_online(false);
        assert!(!probe.is_online());
    }

    #[tokio::test]
    async fn test_manual_notifies_transitions_only() {
        let probe = ManualConnectivity::new(false);
        let mut rx = probe.subscribe();

        probe.set_online(false);
        assert!(!rx.has_changed().unwrap());

        probe.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_http_publishes_reachability_changes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_ok(listener));

        let client = RestClient::from_config(&RemoteConfig {
            base_url: Some(format!("http://{addr}")),
            api_key: Some("test-key".to_string()),
            request_timeout_secs: 2,
        })
        .unwrap();
        let connectivity = HttpConnectivity::start(client, Duration::from_millis(200)).await;
        assert!(connectivity.is_online());

        let mut rx = connectivity.subscribe();
        // repeated successful polls publish nothing
        assert!(timeout(Duration::from_millis(600), rx.changed()).await.is_err());

        server.abort();
        let _ = server.await;

        timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("no transition after the backend went away")
            .unwrap();
        assert!(!*rx.borrow_and_update());
        assert!(!connectivity.is_online());

        // repeated failed polls publish nothing either
        assert!(timeout(Duration::from_millis(600), rx.changed()).await.is_err());
    }
}
