//! Report subscriptions.
//!
//! Connections that logged in with `subscribeOnDownloadingFilesReport` are
//! registered here under their username. Publishing a report writes one
//! event frame to each of that user's subscribed connections.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::identifiers::ConnectionId;

// ============================================================================
// SubscriptionRegistry
// ============================================================================

/// Outbound channel of one connection.
pub(crate) type Outbound = mpsc::UnboundedSender<Vec<u8>>;

#[derive(Debug)]
struct Subscription {
    username: String,
    outbound: Outbound,
}

/// Subscribed connections keyed by connection id.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    subscriptions: RwLock<FxHashMap<ConnectionId, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn subscribe(&self, connection_id: ConnectionId, username: &str, outbound: Outbound) {
        debug!(%connection_id, username, "Report subscription added");
        self.subscriptions.write().insert(
            connection_id,
            Subscription {
                username: username.to_string(),
                outbound,
            },
        );
    }

    pub fn unsubscribe(&self, connection_id: ConnectionId) -> bool {
        let removed = self.subscriptions.write().remove(&connection_id).is_some();
        if removed {
            debug!(%connection_id, "Report subscription removed");
        }
        removed
    }

    /// Sends `frame` to every connection subscribed as `username`.
    ///
    /// Returns the number of connections it was queued for.
    pub fn publish(&self, username: &str, frame: &[u8]) -> usize {
        let subscriptions = self.subscriptions.read();
        let delivered = subscriptions
            .values()
            .filter(|sub| sub.username == username)
            .filter(|sub| sub.outbound.send(frame.to_vec()).is_ok())
            .count();

        trace!(username, delivered, "Report published");
        delivered
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_only_matching_user() {
        let registry = SubscriptionRegistry::default();
        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        registry.subscribe(ConnectionId::generate(), "alice", alice_tx);
        registry.subscribe(ConnectionId::generate(), "bob", bob_tx);

        assert_eq!(registry.publish("alice", &[1, 2]), 1);
        assert_eq!(alice_rx.try_recv().unwrap(), vec![1, 2]);
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn test_multiple_connections_per_user() {
        let registry = SubscriptionRegistry::default();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        registry.subscribe(ConnectionId::generate(), "alice", tx1);
        registry.subscribe(ConnectionId::generate(), "alice", tx2);

        assert_eq!(registry.publish("alice", &[0]), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = SubscriptionRegistry::default();
        let id = ConnectionId::generate();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.subscribe(id, "alice", tx);

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.publish("alice", &[0]), 0);
    }

    #[test]
    fn test_closed_receiver_not_counted() {
        let registry = SubscriptionRegistry::default();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.subscribe(ConnectionId::generate(), "alice", tx);
        drop(rx);

        assert_eq!(registry.publish("alice", &[0]), 0);
    }
}
