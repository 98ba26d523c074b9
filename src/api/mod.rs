// HTTP surface: WebSocket fan-out endpoint plus status routes

pub mod status;
pub mod websocket;

pub use status::StatusResponse;
pub use websocket::ws_handler;

use crate::config::BridgeConfig;
use crate::fanout::ClientRegistry;
use crate::relay::RelayMetrics;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ClientRegistry>,
    pub metrics: Arc<RelayMetrics>,
    pub config: Arc<BridgeConfig>,
}

/// Build the router: WebSocket at `listener.ws_path`, status under /api
pub fn create_router(state: AppState) -> Router {
    let ws_path = state.config.listener.ws_path.clone();
    let state = Arc::new(state);

    let api: Router<Arc<AppState>> = Router::new()
        .route("/api/status", get(status::get_status))
        .route("/api/clients", get(status::get_clients))
        .route("/health", get(status::health))
        .layer(CorsLayer::permissive());

    Router::new()
        .route(&ws_path, get(ws_handler))
        .merge(api)
        .with_state(state)
}
