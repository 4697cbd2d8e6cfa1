//! Connectivity state tracking
//!
//! The platform's network monitor pushes state changes into a
//! [`ConnectivityMonitor`]; interested components subscribe to a watch channel
//! and react to transitions (the offline queue syncs when coming online).

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

/// Network connectivity state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum NetworkState {
    /// Connected to network
    Online,

    /// Disconnected from network
    Offline,

    /// Network state unknown
    #[default]
    Unknown,
}

impl NetworkState {
    /// Whether requests can be attempted
    pub fn is_online(&self) -> bool {
        matches!(self, NetworkState::Online)
    }
}

impl From<bool> for NetworkState {
    fn from(connected: bool) -> Self {
        if connected {
            NetworkState::Online
        } else {
            NetworkState::Offline
        }
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkState::Online => write!(f, "online"),
            NetworkState::Offline => write!(f, "offline"),
            NetworkState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Broadcasts connectivity changes reported by the host platform
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<NetworkState>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(NetworkState::Unknown)
    }
}

impl ConnectivityMonitor {
    /// Create a monitor with an initial state
    pub fn new(initial: NetworkState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current network state
    pub fn state(&self) -> NetworkState {
        *self.tx.borrow()
    }

    /// Report a new network state
    ///
    /// Subscribers are only notified when the state actually changes. Returns
    /// whether it did.
    pub fn set_state(&self, state: NetworkState) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            tracing::info!(%state, "network state changed");
        }
        changed
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_unknown() {
        let monitor = ConnectivityMonitor::default();
        assert_eq!(monitor.state(), NetworkState::Unknown);
        assert!(!monitor.state().is_online());
    }

    #[test]
    fn test_from_bool() {
        assert_eq!(NetworkState::from(true), NetworkState::Online);
        assert_eq!(NetworkState::from(false), NetworkState::Offline);
    }

    #[test]
    fn test_display() {
        assert_eq!(NetworkState::Online.to_string(), "online");
        assert_eq!(NetworkState::Offline.to_string(), "offline");
        assert_eq!(NetworkState::Unknown.to_string(), "unknown");
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let monitor = ConnectivityMonitor::new(NetworkState::Offline);
        let mut rx = monitor.subscribe();

        assert!(monitor.set_state(NetworkState::Online));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), NetworkState::Online);
    }

    #[tokio::test]
    async fn test_repeated_state_does_not_notify() {
        let monitor = ConnectivityMonitor::new(NetworkState::Online);
        let rx = monitor.subscribe();

        assert!(!monitor.set_state(NetworkState::Online));
        assert!(!rx.has_changed().unwrap());
    }
}
