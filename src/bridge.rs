use crate::api::{create_router, AppState};
use crate::broker::{self, run_subscriber, BrokerConnector};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::fanout::ClientRegistry;
use crate::relay::{self, run_relay, RelayMetrics};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A running bridge: listener, relay task and broker subscriber.
pub struct Bridge {
    local_addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    metrics: Arc<RelayMetrics>,
    server: JoinHandle<()>,
    relay: JoinHandle<()>,
    subscriber: JoinHandle<()>,
}

impl Bridge {
    /// Start with the connector selected by the broker URL scheme
    pub async fn start(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let metrics = Arc::new(RelayMetrics::new());
        let connector = broker::connector_for(&config.broker, Arc::clone(&metrics))?;
        Self::launch(config, connector, metrics).await
    }

    /// Bind the listener, then spawn the relay, subscriber and HTTP server.
    ///
    /// Fails on invalid configuration or if the listener cannot be bound;
    /// broker trouble is handled by the subscriber's reconnect loop.
    pub async fn start_with_connector(
        config: BridgeConfig,
        connector: Arc<dyn BrokerConnector>,
    ) -> Result<Self> {
        config.validate()?;
        Self::launch(config, connector, Arc::new(RelayMetrics::new())).await
    }

    async fn launch(
        config: BridgeConfig,
        connector: Arc<dyn BrokerConnector>,
        metrics: Arc<RelayMetrics>,
    ) -> Result<Self> {
        let addr = config.listener.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| BridgeError::ListenerBind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BridgeError::ListenerBind { addr, source })?;

        let config = Arc::new(config);
        let registry = Arc::new(ClientRegistry::new(&config.fanout));

        let (tx, rx) = relay::channel(config.relay.channel_capacity);
        let relay = tokio::spawn(run_relay(rx, Arc::clone(&registry), Arc::clone(&metrics)));

        let subscriber = tokio::spawn(run_subscriber(
            connector,
            config.broker.topic.clone(),
            config.reconnect.clone(),
            tx,
            Arc::clone(&metrics),
        ));

        let router = create_router(AppState {
            registry: Arc::clone(&registry),
            metrics: Arc::clone(&metrics),
            config: Arc::clone(&config),
        });

        let server = tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                error!(error = %e, "WebSocket server error");
            }
        });

        info!(
            addr = %local_addr,
            ws_path = %config.listener.ws_path,
            "WebSocket server listening"
        );

        Ok(Self {
            local_addr,
            registry,
            metrics,
            server,
            relay,
            subscriber,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Abort all tasks; open sockets are dropped
    pub fn shutdown(self) {
        self.subscriber.abort();
        self.relay.abort();
        self.server.abort();
        info!("Bridge stopped");
    }
}
