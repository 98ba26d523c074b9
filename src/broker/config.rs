use crate::error::{BridgeError, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Broker connection configuration
#[derive(Clone, Debug, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// MQTT client identifier, also used as the NATS connection name
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_topic() -> String {
    "test/topic".to_string()
}

fn default_client_id() -> String {
    format!("wsbridge-{}", uuid::Uuid::new_v4().simple())
}

fn default_keep_alive_secs() -> u64 {
    30
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            topic: default_topic(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl BrokerConfig {
    pub fn endpoint(&self) -> Result<BrokerEndpoint> {
        BrokerEndpoint::parse(&self.url)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.endpoint()?;
        if self.topic.trim().is_empty() {
            return Err(BridgeError::Config("broker.topic must not be empty".into()));
        }
        if self.client_id.is_empty() {
            return Err(BridgeError::Config("broker.client_id must not be empty".into()));
        }
        // MQTT keep alive is a u16 number of seconds on the wire
        if !(1..=u16::MAX as u64).contains(&self.keep_alive_secs) {
            return Err(BridgeError::Config(format!(
                "broker.keep_alive_secs must be between 1 and {}, got {}",
                u16::MAX,
                self.keep_alive_secs
            )));
        }
        Ok(())
    }
}

/// Wire protocol spoken to the broker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrokerProtocol {
    Mqtt,
    Nats,
}

impl BrokerProtocol {
    fn default_port(self) -> u16 {
        match self {
            BrokerProtocol::Mqtt => 1883,
            BrokerProtocol::Nats => 4222,
        }
    }
}

/// Parsed broker address
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub protocol: BrokerProtocol,
    pub host: String,
    pub port: u16,
}

impl BrokerEndpoint {
    /// Parse `mqtt://host[:port]`, `tcp://host[:port]` or `nats://host[:port]`.
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| BridgeError::Config(format!("broker url '{url}' has no scheme")))?;

        let protocol = match scheme.to_ascii_lowercase().as_str() {
            "mqtt" | "tcp" => BrokerProtocol::Mqtt,
            "nats" => BrokerProtocol::Nats,
            other => {
                return Err(BridgeError::Config(format!(
                    "unsupported broker scheme '{other}' (expected mqtt, tcp or nats)"
                )))
            }
        };

        let authority = rest.trim_end_matches('/');
        if authority.is_empty() || authority.contains('/') {
            return Err(BridgeError::Config(format!(
                "broker url '{url}' must be scheme://host[:port]"
            )));
        }

        let parse_port = |port: &str| {
            port.parse::<u16>().map_err(|_| {
                BridgeError::Config(format!("invalid port '{port}' in broker url '{url}'"))
            })
        };

        // IPv6 literals are bracketed: [::1] or [::1]:1883
        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, rest) = bracketed.split_once(']').ok_or_else(|| {
                BridgeError::Config(format!("unterminated IPv6 host in broker url '{url}'"))
            })?;
            let port = match rest {
                "" => protocol.default_port(),
                rest => match rest.strip_prefix(':') {
                    Some(port) => parse_port(port)?,
                    None => {
                        return Err(BridgeError::Config(format!(
                            "unexpected '{rest}' after IPv6 host in broker url '{url}'"
                        )))
                    }
                },
            };
            (host, port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(port)?),
                None => (authority, protocol.default_port()),
            }
        };

        if host.is_empty() || port == 0 {
            return Err(BridgeError::Config(format!(
                "broker url '{url}' needs a host and a non-zero port"
            )));
        }

        Ok(Self {
            protocol,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.protocol {
            BrokerProtocol::Mqtt => "mqtt",
            BrokerProtocol::Nats => "nats",
        };
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

/// Reconnect backoff policy
#[derive(Clone, Debug, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay_ms == 0 {
            return Err(BridgeError::Config(
                "reconnect.initial_delay_ms must be greater than 0".into(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(BridgeError::Config(
                "reconnect.max_delay_ms must be >= reconnect.initial_delay_ms".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(BridgeError::Config(
                "reconnect.multiplier must be a finite number >= 1.0".into(),
            ));
        }
        Ok(())
    }
}
