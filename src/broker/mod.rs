// Broker subscriber: one topic, opaque payloads, reconnect with backoff

mod backoff;
pub mod config;
mod mqtt;
mod nats;
mod subscriber;

pub use backoff::Backoff;
pub use config::{BrokerConfig, BrokerEndpoint, BrokerProtocol, ReconnectConfig};
pub use mqtt::MqttConnector;
pub use nats::NatsConnector;
pub use subscriber::run_subscriber;

use crate::error::{BridgeError, Result};
use crate::relay::RelayMetrics;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// One message received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl BrokerMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Lifecycle of a broker subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SubscriptionState {
    Disconnected = 0,
    Connected = 1,
    Subscribed = 2,
}

impl SubscriptionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => SubscriptionState::Connected,
            2 => SubscriptionState::Subscribed,
            _ => SubscriptionState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Disconnected => "disconnected",
            SubscriptionState::Connected => "connected",
            SubscriptionState::Subscribed => "subscribed",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live connection to a broker, speaking one wire protocol.
#[async_trait]
pub trait BrokerSession: Send {
    /// Register interest in `topic`. Resolves once the broker has accepted it.
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Next published message, or `None` once the connection has dropped.
    async fn next_message(&mut self) -> Option<BrokerMessage>;
}

/// Dials new broker sessions.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>>;

    /// Human-readable broker address for logs
    fn describe(&self) -> String;
}

/// Pick the connector matching the configured URL scheme.
///
/// `metrics` receives broker state changes the client library handles on
/// its own (NATS reconnects internally).
pub fn connector_for(
    config: &BrokerConfig,
    metrics: Arc<RelayMetrics>,
) -> Result<Arc<dyn BrokerConnector>> {
    let endpoint = config.endpoint()?;
    let connector: Arc<dyn BrokerConnector> = match endpoint.protocol {
        BrokerProtocol::Mqtt => Arc::new(MqttConnector::new(
            endpoint,
            config.client_id.clone(),
            config.keep_alive(),
        )),
        BrokerProtocol::Nats => Arc::new(NatsConnector::new(
            endpoint,
            config.client_id.clone(),
            metrics,
        )),
    };
    Ok(connector)
}

/// A single broker subscription.
///
/// Moves `Disconnected -> Connected -> Subscribed`, then is consumed by
/// [`Subscription::into_stream`]. The stream ends when the connection drops;
/// a fresh `Subscription` is needed to resume.
pub struct Subscription {
    state: SubscriptionState,
    topic: Option<String>,
    session: Option<Box<dyn BrokerSession>>,
}

impl Subscription {
    pub fn new() -> Self {
        Self {
            state: SubscriptionState::Disconnected,
            topic: None,
            session: None,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Establish the broker connection
    pub async fn connect(&mut self, connector: &dyn BrokerConnector) -> Result<()> {
        if self.state != SubscriptionState::Disconnected {
            return Err(BridgeError::Connection(format!(
                "connect issued while {}",
                self.state
            )));
        }

        let session = connector.connect().await?;
        self.session = Some(session);
        self.state = SubscriptionState::Connected;
        Ok(())
    }

    /// Subscribe to `topic`; only valid while `Connected`
    pub async fn subscribe(&mut self, topic: &str) -> Result<()> {
        if self.state != SubscriptionState::Connected {
            return Err(BridgeError::subscription(
                topic,
                format!("subscribe issued while {}", self.state),
            ));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BridgeError::subscription(topic, "no broker session"))?;
        session.subscribe(topic).await?;

        self.topic = Some(topic.to_string());
        self.state = SubscriptionState::Subscribed;
        Ok(())
    }

    /// Consume the subscription into its message stream
    pub fn into_stream(self) -> Result<BoxStream<'static, BrokerMessage>> {
        let topic = self.topic.unwrap_or_default();
        match (self.state, self.session) {
            (SubscriptionState::Subscribed, Some(session)) => Ok(stream::unfold(
                session,
                |mut session| async move {
                    session
                        .next_message()
                        .await
                        .map(|message| (message, session))
                },
            )
            .boxed()),
            (state, _) => Err(BridgeError::subscription(
                &topic,
                format!("message stream requested while {}", state),
            )),
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}
