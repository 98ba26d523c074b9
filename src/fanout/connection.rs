use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque client identity (UUID v7, time ordered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Client connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State cell shared by the registry entry and the socket task.
/// Transitions only move forward.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advance to `next` unless already at or past it
    pub(crate) fn advance(&self, next: ConnectionState) {
        self.0.fetch_max(next as u8, Ordering::AcqRel);
    }
}

/// Registry-side view of a client: where to enqueue payloads.
pub(crate) struct ClientHandle {
    pub(crate) peer: Option<SocketAddr>,
    pub(crate) connected_at: DateTime<Utc>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) tx: mpsc::Sender<Bytes>,
}

/// Socket-side view of a client, owned by the task driving the WebSocket.
///
/// `recv` yields payloads in broadcast order and returns `None` once the
/// registry has dropped this connection.
pub struct ClientConnection {
    id: ConnectionId,
    state: Arc<StateCell>,
    rx: mpsc::Receiver<Bytes>,
}

impl ClientConnection {
    pub(crate) fn new(id: ConnectionId, state: Arc<StateCell>, rx: mpsc::Receiver<Bytes>) -> Self {
        Self { id, state, rx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Mark the connection as closing so broadcasts skip it
    pub fn begin_close(&self) {
        self.state.advance(ConnectionState::Closing);
    }
}

/// Snapshot of one registered client
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub id: ConnectionId,
    pub peer: Option<SocketAddr>,
    pub state: ConnectionState,
    pub connected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_only_moves_forward() {
        let cell = StateCell::new(ConnectionState::Connecting);
        cell.advance(ConnectionState::Open);
        assert_eq!(cell.get(), ConnectionState::Open);

        cell.advance(ConnectionState::Closed);
        cell.advance(ConnectionState::Closing);
        assert_eq!(cell.get(), ConnectionState::Closed);
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }
}
