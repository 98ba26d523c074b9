use super::{
    Backoff, BrokerConnector, BrokerMessage, ReconnectConfig, Subscription, SubscriptionState,
};
use crate::error::Result;
use crate::relay::RelayMetrics;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Run the broker subscriber until the relay channel closes.
///
/// Each pass creates a fresh [`Subscription`], subscribes to `topic` and
/// forwards every message into `tx`. Connection failures and drops are
/// never fatal: the loop sleeps according to the backoff policy and tries
/// again. The backoff resets whenever a session reaches `Subscribed`.
pub async fn run_subscriber(
    connector: Arc<dyn BrokerConnector>,
    topic: String,
    reconnect: ReconnectConfig,
    tx: mpsc::Sender<BrokerMessage>,
    metrics: Arc<RelayMetrics>,
) {
    info!(broker = %connector.describe(), topic = %topic, "Starting broker subscriber");

    let mut backoff = Backoff::new(&reconnect);
    let mut sessions: u64 = 0;

    while !tx.is_closed() {
        match open_subscription(connector.as_ref(), &topic, &metrics).await {
            Ok(subscription) => {
                backoff.reset();
                sessions += 1;
                if sessions > 1 {
                    metrics.record_reconnect();
                    info!(sessions = sessions, "Broker subscription resumed");
                }

                match subscription.into_stream() {
                    Ok(mut messages) => {
                        while let Some(message) = messages.next().await {
                            debug!(
                                topic = %message.topic,
                                bytes = message.payload.len(),
                                "Received broker message"
                            );
                            if tx.send(message).await.is_err() {
                                info!("Relay channel closed, stopping broker subscriber");
                                metrics.set_broker_state(SubscriptionState::Disconnected);
                                return;
                            }
                        }
                        warn!(broker = %connector.describe(), "Broker connection dropped");
                    }
                    Err(e) => warn!(error = %e, "Broker subscription unusable"),
                }
            }
            Err(e) => {
                warn!(
                    broker = %connector.describe(),
                    attempt = backoff.attempts() + 1,
                    error = %e,
                    "Broker session failed"
                );
            }
        }

        metrics.set_broker_state(SubscriptionState::Disconnected);

        let delay = backoff.next_delay();
        info!(delay_ms = delay.as_millis() as u64, "Reconnecting to broker after backoff");
        tokio::time::sleep(delay).await;
    }

    info!("Relay channel closed, broker subscriber stopped");
}

async fn open_subscription(
    connector: &dyn BrokerConnector,
    topic: &str,
    metrics: &RelayMetrics,
) -> Result<Subscription> {
    let mut subscription = Subscription::new();

    subscription.connect(connector).await?;
    metrics.set_broker_state(SubscriptionState::Connected);

    subscription.subscribe(topic).await?;
    metrics.set_broker_state(SubscriptionState::Subscribed);

    Ok(subscription)
}
