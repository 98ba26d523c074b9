use super::{BrokerConnector, BrokerEndpoint, BrokerMessage, BrokerSession};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS,
    SubscribeReasonCode,
};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Requests buffered between the client handle and the event loop
const REQUEST_CAPACITY: usize = 16;

/// MQTT 3.1.1 connector
pub struct MqttConnector {
    endpoint: BrokerEndpoint,
    client_id: String,
    keep_alive: Duration,
}

impl MqttConnector {
    pub fn new(endpoint: BrokerEndpoint, client_id: String, keep_alive: Duration) -> Self {
        Self {
            endpoint,
            client_id,
            keep_alive,
        }
    }
}

#[async_trait]
impl BrokerConnector for MqttConnector {
    /// Connect and wait for CONNACK
    async fn connect(&self) -> Result<Box<dyn BrokerSession>> {
        info!("Connecting to MQTT broker at {}", self.endpoint);

        let mut options = MqttOptions::new(
            self.client_id.clone(),
            self.endpoint.host.clone(),
            self.endpoint.port,
        );
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(BridgeError::Connection(format!(
                            "broker refused connection: {:?}",
                            ack.code
                        )));
                    }
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    return Err(BridgeError::Connection(format!(
                        "failed to connect to {}: {}",
                        self.endpoint, e
                    )))
                }
            }
        }

        info!(client_id = %self.client_id, "Connected to MQTT broker");

        Ok(Box::new(MqttSession {
            client,
            eventloop,
            pending: VecDeque::new(),
        }))
    }

    fn describe(&self) -> String {
        self.endpoint.to_string()
    }
}

/// One MQTT connection. The event loop is never polled again after an
/// error, so rumqttc's built-in reconnect stays out of the way.
struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
    /// Publishes that arrived while waiting for SUBACK
    pending: VecDeque<BrokerMessage>,
}

impl MqttSession {
    fn to_message(publish: rumqttc::Publish) -> BrokerMessage {
        BrokerMessage {
            topic: publish.topic,
            payload: publish.payload,
        }
    }
}

#[async_trait]
impl BrokerSession for MqttSession {
    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| BridgeError::subscription(topic, e.to_string()))?;

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(BridgeError::subscription(topic, "rejected by broker"));
                    }
                    info!(topic = %topic, "Subscribed to MQTT topic");
                    return Ok(());
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.pending.push_back(Self::to_message(publish));
                }
                Ok(_) => {}
                Err(e) => return Err(BridgeError::Connection(e.to_string())),
            }
        }
    }

    async fn next_message(&mut self) -> Option<BrokerMessage> {
        if let Some(message) = self.pending.pop_front() {
            return Some(message);
        }

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Some(Self::to_message(publish));
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("MQTT broker sent DISCONNECT");
                    return None;
                }
                Ok(event) => {
                    debug!(event = ?event, "MQTT event");
                }
                Err(e) => {
                    warn!(error = %e, "MQTT connection lost");
                    return None;
                }
            }
        }
    }
}
