use crate::error::{BridgeError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Client fan-out configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FanoutConfig {
    /// Upper bound on simultaneously open client connections
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Payloads buffered per client before it is considered unresponsive
    #[serde(default = "default_client_queue_capacity")]
    pub client_queue_capacity: usize,
    /// Per-frame socket write timeout (milliseconds)
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default)]
    pub frame_mode: FrameMode,
}

fn default_max_clients() -> usize {
    1024
}

fn default_client_queue_capacity() -> usize {
    64
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            client_queue_capacity: default_client_queue_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
            frame_mode: FrameMode::default(),
        }
    }
}

impl FanoutConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            return Err(BridgeError::Config("fanout.max_clients must be greater than 0".into()));
        }
        if self.client_queue_capacity == 0 {
            return Err(BridgeError::Config(
                "fanout.client_queue_capacity must be greater than 0".into(),
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "fanout.send_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// How payload bytes map onto WebSocket frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameMode {
    /// Text when the payload is valid UTF-8, binary otherwise
    #[default]
    Auto,
    /// Always text; invalid UTF-8 is replaced
    Text,
    /// Always binary
    Binary,
}
