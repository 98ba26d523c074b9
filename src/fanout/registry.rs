use super::config::FanoutConfig;
use super::connection::{
    ClientConnection, ClientHandle, ClientInfo, ConnectionId, ConnectionState, StateCell,
};
use crate::error::{BridgeError, Result};
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the payload was queued for
    pub delivered: usize,
    /// Connections removed during this broadcast
    pub pruned: usize,
}

/// Set of open client connections.
///
/// Broadcast never touches a socket: it enqueues into each client's bounded
/// queue without waiting, so an unresponsive client can only fill its own
/// queue, at which point it is pruned.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, ClientHandle>,
    /// Admitted connections, kept separately so the limit holds under concurrent accepts
    admitted: AtomicUsize,
    max_clients: usize,
    queue_capacity: usize,
}

impl ClientRegistry {
    pub fn new(config: &FanoutConfig) -> Self {
        Self {
            clients: DashMap::new(),
            admitted: AtomicUsize::new(0),
            max_clients: config.max_clients,
            queue_capacity: config.client_queue_capacity.max(1),
        }
    }

    /// Register a new connection in the Open state
    pub fn on_connect(&self, peer: Option<SocketAddr>) -> Result<ClientConnection> {
        let max = self.max_clients;
        self.admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .map_err(|_| BridgeError::CapacityExceeded { max })?;

        let id = ConnectionId::new();
        // Open before it is visible, so a concurrent broadcast never sees it half-registered
        let state = Arc::new(StateCell::new(ConnectionState::Open));
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        self.clients.insert(
            id,
            ClientHandle {
                peer,
                connected_at: Utc::now(),
                state: Arc::clone(&state),
                tx,
            },
        );

        info!(client_id = %id, peer = ?peer, open = self.len(), "Client connected");

        Ok(ClientConnection::new(id, state, rx))
    }

    /// Remove a connection. Unknown or already-removed ids are a no-op.
    pub fn on_close(&self, id: ConnectionId) -> bool {
        let removed = self.remove(id, ConnectionState::Closed);
        if removed {
            info!(client_id = %id, open = self.len(), "Client disconnected");
        }
        removed
    }

    /// Queue `payload` for every Open connection and prune closing or closed
    /// ones. Connections still being set up are skipped.
    pub fn broadcast(&self, payload: &Bytes) -> BroadcastReport {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for entry in self.clients.iter() {
            let handle = entry.value();

            match handle.state.get() {
                ConnectionState::Open => {}
                ConnectionState::Connecting => continue,
                state => {
                    failed.push((*entry.key(), format!("connection is {}", state)));
                    continue;
                }
            }

            match handle.tx.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    failed.push((*entry.key(), "outbound queue full".to_string()))
                }
                Err(TrySendError::Closed(_)) => {
                    failed.push((*entry.key(), "connection closed".to_string()))
                }
            }
        }

        // Shard locks are released; safe to mutate now
        let mut pruned = 0;
        for (id, reason) in failed {
            let err = BridgeError::ClientWrite { id, reason };
            warn!(error = %err, "Pruning client");
            if self.remove(id, ConnectionState::Closing) {
                pruned += 1;
            }
        }

        BroadcastReport { delivered, pruned }
    }

    fn remove(&self, id: ConnectionId, state: ConnectionState) -> bool {
        match self.clients.remove(&id) {
            Some((_, handle)) => {
                handle.state.advance(state);
                self.admitted.fetch_sub(1, Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    pub fn has_capacity(&self) -> bool {
        self.admitted.load(Ordering::Acquire) < self.max_clients
    }

    /// Snapshot of registered clients, oldest first
    pub fn clients(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<ClientInfo> = self
            .clients
            .iter()
            .map(|entry| ClientInfo {
                id: *entry.key(),
                peer: entry.peer,
                state: entry.state.get(),
                connected_at: entry.connected_at,
            })
            .collect();
        clients.sort_by_key(|c| c.connected_at);
        clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_skips_connecting_entries() {
        let registry = ClientRegistry::new(&FanoutConfig::default());
        let id = ConnectionId::new();
        let state = Arc::new(StateCell::new(ConnectionState::Connecting));
        let (tx, mut rx) = mpsc::channel(4);
        registry.admitted.fetch_add(1, Ordering::AcqRel);
        registry.clients.insert(
            id,
            ClientHandle {
                peer: None,
                connected_at: Utc::now(),
                state: Arc::clone(&state),
                tx,
            },
        );

        let report = registry.broadcast(&Bytes::from("42.5"));
        assert_eq!(report, BroadcastReport::default());
        assert!(registry.contains(id));
        assert!(rx.try_recv().is_err());

        state.advance(ConnectionState::Open);
        let report = registry.broadcast(&Bytes::from("43.1"));
        assert_eq!(report.delivered, 1);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from("43.1"));
    }
}
