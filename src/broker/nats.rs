use super::{BrokerConnector, BrokerEndpoint, BrokerMessage, BrokerSession, SubscriptionState};
use crate::error::{BridgeError, Result};
use crate::relay::RelayMetrics;
use async_nats::Event;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// NATS core connector (subject = topic)
pub struct NatsConnector {
    url: String,
    name: String,
    metrics: Arc<RelayMetrics>,
}

impl NatsConnector {
    pub fn new(endpoint: BrokerEndpoint, name: String, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            url: endpoint.to_string(),
            name,
            metrics,
        }
    }
}

/// Mirrors the client's internal reconnects into the broker state.
///
/// async-nats keeps subscriptions alive across reconnects, so the session
/// stream never ends on a drop and the subscriber loop never sees it.
struct LinkTracker {
    metrics: Arc<RelayMetrics>,
    subscribed: AtomicBool,
    lost: AtomicBool,
}

impl LinkTracker {
    fn new(metrics: Arc<RelayMetrics>) -> Self {
        Self {
            metrics,
            subscribed: AtomicBool::new(false),
            lost: AtomicBool::new(false),
        }
    }

    fn on_subscribed(&self) {
        self.subscribed.store(true, Ordering::Release);
    }

    fn on_disconnected(&self) {
        warn!("NATS connection lost, client is reconnecting");
        self.lost.store(true, Ordering::Release);
        if self.subscribed.load(Ordering::Acquire) {
            self.metrics.set_broker_state(SubscriptionState::Disconnected);
        }
    }

    fn on_connected(&self) {
        // Only a reconnect of a subscribed session changes state here;
        // the first connect is reported by the subscriber loop
        if self.lost.swap(false, Ordering::AcqRel) && self.subscribed.load(Ordering::Acquire) {
            info!("NATS connection re-established, subscription restored");
            self.metrics.set_broker_state(SubscriptionState::Subscribed);
            self.metrics.record_reconnect();
        }
    }
}

#[async_trait]
impl BrokerConnector for NatsConnector {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>> {
        info!("Connecting to NATS at {}", self.url);

        let tracker = Arc::new(LinkTracker::new(Arc::clone(&self.metrics)));
        let events = Arc::clone(&tracker);

        let client = async_nats::ConnectOptions::new()
            .name(&self.name)
            .event_callback(move |event| {
                let events = Arc::clone(&events);
                async move {
                    match event {
                        Event::Disconnected => events.on_disconnected(),
                        Event::Connected => events.on_connected(),
                        other => debug!(event = %other, "NATS event"),
                    }
                }
            })
            .connect(&self.url)
            .await
            .map_err(|e| {
                BridgeError::Connection(format!("failed to connect to {}: {}", self.url, e))
            })?;

        Ok(Box::new(NatsSession {
            client,
            subscriber: None,
            tracker,
        }))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

struct NatsSession {
    client: async_nats::Client,
    subscriber: Option<async_nats::Subscriber>,
    tracker: Arc<LinkTracker>,
}

#[async_trait]
impl BrokerSession for NatsSession {
    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        let subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| BridgeError::subscription(topic, e.to_string()))?;

        // Round-trip so a dead connection surfaces here rather than later
        self.client
            .flush()
            .await
            .map_err(|e| BridgeError::Connection(e.to_string()))?;

        info!(subject = %topic, "Subscribed to NATS subject");
        self.subscriber = Some(subscriber);
        self.tracker.on_subscribed();
        Ok(())
    }

    async fn next_message(&mut self) -> Option<BrokerMessage> {
        let message = self.subscriber.as_mut()?.next().await?;
        Some(BrokerMessage {
            topic: message.subject.to_string(),
            payload: message.payload,
        })
    }
}
