use crate::broker::SubscriptionState;
use crate::fanout::BroadcastReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};

/// Counters for the running bridge
#[derive(Debug)]
pub struct RelayMetrics {
    /// Messages received from the broker (lifetime counter)
    messages_received: AtomicU64,

    /// Per-client deliveries (one message to N clients counts N)
    deliveries: AtomicU64,

    /// Clients removed by broadcast after a failed write
    pruned_clients: AtomicU64,

    /// Successful re-subscriptions after the first session
    broker_reconnects: AtomicU64,

    broker_state: AtomicU8,

    /// Unix millis of the last broker message, 0 = none yet
    last_message_ms: AtomicI64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            pruned_clients: AtomicU64::new(0),
            broker_reconnects: AtomicU64::new(0),
            broker_state: AtomicU8::new(SubscriptionState::Disconnected as u8),
            last_message_ms: AtomicI64::new(0),
        }
    }

    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.last_message_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, report: &BroadcastReport) {
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.pruned_clients
            .fetch_add(report.pruned as u64, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.broker_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_broker_state(&self, state: SubscriptionState) {
        self.broker_state.store(state as u8, Ordering::Relaxed);
    }

    pub fn broker_state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.broker_state.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_ms = self.last_message_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            pruned_clients: self.pruned_clients.load(Ordering::Relaxed),
            broker_reconnects: self.broker_reconnects.load(Ordering::Relaxed),
            broker_state: self.broker_state(),
            last_message_at: (last_ms > 0)
                .then(|| DateTime::from_timestamp_millis(last_ms))
                .flatten(),
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub deliveries: u64,
    pub pruned_clients: u64,
    pub broker_reconnects: u64,
    pub broker_state: SubscriptionState,
    pub last_message_at: Option<DateTime<Utc>>,
}
