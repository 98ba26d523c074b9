use thiserror::Error;

use crate::fanout::ConnectionId;

/// Errors raised across the bridge.
///
/// Only `ListenerBind` and `Config` are fatal; everything else is isolated to
/// one broker session or one client connection and logged.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Broker unreachable or connection dropped
    #[error("broker connection error: {0}")]
    Connection(String),

    /// Subscribe issued in the wrong state, or rejected by the broker
    #[error("subscription to '{topic}' failed: {reason}")]
    Subscription { topic: String, reason: String },

    /// A single client could not be written to
    #[error("write to client {id} failed: {reason}")]
    ClientWrite { id: ConnectionId, reason: String },

    /// Listener address unavailable at startup
    #[error("failed to bind listener on {addr}: {source}")]
    ListenerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Registry is at its client limit
    #[error("client limit reached ({max} connections)")]
    CapacityExceeded { max: usize },
}

impl BridgeError {
    pub(crate) fn subscription(topic: &str, reason: impl Into<String>) -> Self {
        Self::Subscription {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that must stop the process at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ListenerBind { .. } | Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
