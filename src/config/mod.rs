pub mod env;
pub use env::apply_env_overrides;

use crate::error::{BridgeError, Result};
use serde::Deserialize;

// Re-export section types that live with their modules
pub use crate::broker::config::{BrokerConfig, ReconnectConfig};
pub use crate::fanout::config::{FanoutConfig, FrameMode};

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "WSBRIDGE_CONFIG";

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// WebSocket listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 binds an ephemeral port
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ws_path() -> String {
    "/".to_string()
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
        }
    }
}

impl ListenerConfig {
    /// `host:port`, bracketing IPv6 literals
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(BridgeError::Config("listener.host must not be empty".into()));
        }
        if !self.ws_path.starts_with('/') {
            return Err(BridgeError::Config(format!(
                "listener.ws_path must start with '/', got '{}'",
                self.ws_path
            )));
        }
        if self.ws_path.starts_with("/api/") || self.ws_path == "/health" {
            return Err(BridgeError::Config(format!(
                "listener.ws_path '{}' collides with a built-in route",
                self.ws_path
            )));
        }
        Ok(())
    }
}

/// Relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Broker messages buffered between the subscriber and the relay task
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl BridgeConfig {
    /// Load from `WSBRIDGE_CONFIG` (if set), apply env overrides, validate
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::default(),
        };
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.broker.validate()?;
        self.listener.validate()?;
        self.fanout.validate()?;
        self.reconnect.validate()?;
        if self.relay.channel_capacity == 0 {
            return Err(BridgeError::Config(
                "relay.channel_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<BridgeConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| BridgeError::Config(format!("cannot read config file '{}': {}", path, e)))?;
    toml::from_str(&contents)
        .map_err(|e| BridgeError::Config(format!("cannot parse config file '{}': {}", path, e)))
}
