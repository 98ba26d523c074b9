// Relay: the single task that moves broker messages into the fan-out registry

mod metrics;

pub use metrics::{MetricsSnapshot, RelayMetrics};

use crate::broker::BrokerMessage;
use crate::fanout::ClientRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Channel between the broker subscriber and the relay task
pub fn channel(capacity: usize) -> (mpsc::Sender<BrokerMessage>, mpsc::Receiver<BrokerMessage>) {
    mpsc::channel(capacity.max(1))
}

/// Broadcast every received message, in arrival order, until the channel closes
pub async fn run_relay(
    mut rx: mpsc::Receiver<BrokerMessage>,
    registry: Arc<ClientRegistry>,
    metrics: Arc<RelayMetrics>,
) {
    info!("Relay started");

    while let Some(message) = rx.recv().await {
        metrics.record_message();

        let report = registry.broadcast(&message.payload);
        metrics.record_broadcast(&report);

        debug!(
            topic = %message.topic,
            bytes = message.payload.len(),
            delivered = report.delivered,
            pruned = report.pruned,
            "Relayed message"
        );
    }

    info!("Relay channel closed, relay stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::FanoutConfig;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_relay_broadcasts_in_arrival_order() {
        let registry = Arc::new(ClientRegistry::new(&FanoutConfig::default()));
        let metrics = Arc::new(RelayMetrics::new());
        let mut a = registry.on_connect(None).unwrap();
        let mut b = registry.on_connect(None).unwrap();

        let (tx, rx) = channel(8);
        let handle = tokio::spawn(run_relay(rx, Arc::clone(&registry), Arc::clone(&metrics)));

        for value in ["42.5", "43.1", "44.0"] {
            tx.send(BrokerMessage::new("test/topic", value)).await.unwrap();
        }
        drop(tx);
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        for conn in [&mut a, &mut b] {
            for expected in ["42.5", "43.1", "44.0"] {
                assert_eq!(conn.recv().await.unwrap(), Bytes::from(expected));
            }
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_received, 3);
        assert_eq!(snapshot.deliveries, 6);
    }

    #[tokio::test]
    async fn test_relay_with_no_clients() {
        let registry = Arc::new(ClientRegistry::new(&FanoutConfig::default()));
        let metrics = Arc::new(RelayMetrics::new());

        let (tx, rx) = channel(8);
        let handle = tokio::spawn(run_relay(rx, registry, Arc::clone(&metrics)));

        tx.send(BrokerMessage::new("test/topic", "42.5")).await.unwrap();
        drop(tx);
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        assert_eq!(metrics.snapshot().messages_received, 1);
        assert_eq!(metrics.snapshot().deliveries, 0);
    }
}
