// Shared helpers: in-memory broker and test bridge configuration

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use wsbridge::broker::{BrokerConnector, BrokerMessage, BrokerSession};
use wsbridge::config::BridgeConfig;
use wsbridge::error::{BridgeError, Result};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Broker stand-in. Each `open_session` queues one connection; dropping the
/// returned sender simulates the broker dropping that connection.
#[derive(Default)]
pub struct FakeBroker {
    sessions: Mutex<VecDeque<mpsc::UnboundedReceiver<BrokerMessage>>>,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open_session(&self) -> FakePublisher {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().unwrap().push_back(rx);
        FakePublisher { tx }
    }
}

pub struct FakePublisher {
    tx: mpsc::UnboundedSender<BrokerMessage>,
}

impl FakePublisher {
    pub fn publish(&self, payload: impl Into<bytes::Bytes>) {
        self.tx
            .send(BrokerMessage::new("test/topic", payload))
            .expect("session already consumed and dropped");
    }
}

struct FakeSession {
    rx: mpsc::UnboundedReceiver<BrokerMessage>,
}

#[async_trait]
impl BrokerSession for FakeSession {
    async fn subscribe(&mut self, _topic: &str) -> Result<()> {
        Ok(())
    }

    async fn next_message(&mut self) -> Option<BrokerMessage> {
        self.rx.recv().await
    }
}

#[async_trait]
impl BrokerConnector for FakeBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>> {
        let next = self.sessions.lock().unwrap().pop_front();
        match next {
            Some(rx) => Ok(Box::new(FakeSession { rx })),
            None => Err(BridgeError::Connection("connection refused".to_string())),
        }
    }

    fn describe(&self) -> String {
        "mqtt://fake:1883".to_string()
    }
}

/// Loopback listener on an ephemeral port with fast reconnects
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.reconnect.initial_delay_ms = 5;
    config.reconnect.max_delay_ms = 50;
    config.reconnect.jitter = false;
    config
}

/// Poll `condition` until it holds or TIMEOUT elapses
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met before timeout");
}
