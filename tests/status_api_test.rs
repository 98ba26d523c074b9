// Integration tests for the HTTP routes (status, clients, health, ws upgrade)
//
// Requests go through tower::ServiceExt::oneshot. The WebSocket route returns
// a client error here because test requests carry no hyper upgrade
// extension; the tests only check that the route exists and is not a 404.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tower::ServiceExt;
use wsbridge::api::{create_router, AppState};
use wsbridge::broker::SubscriptionState;
use wsbridge::config::BridgeConfig;
use wsbridge::fanout::ClientRegistry;
use wsbridge::relay::RelayMetrics;

fn make_state(config: BridgeConfig) -> AppState {
    AppState {
        registry: Arc::new(ClientRegistry::new(&config.fanout)),
        metrics: Arc::new(RelayMetrics::new()),
        config: Arc::new(config),
    }
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn get_json(app: Router, uri: &str) -> serde_json::Value {
    let response = app.oneshot(get_request(uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = create_router(make_state(BridgeConfig::default()));
    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_status_reports_defaults() {
    let app = create_router(make_state(BridgeConfig::default()));
    let status = get_json(app, "/api/status").await;

    assert_eq!(status["broker"]["url"], "mqtt://localhost:1883");
    assert_eq!(status["broker"]["topic"], "test/topic");
    assert_eq!(status["broker"]["state"], "disconnected");
    assert_eq!(status["broker"]["reconnects"], 0);
    assert_eq!(status["clients"]["open"], 0);
    assert_eq!(status["clients"]["max"], 1024);
    assert_eq!(status["messages"]["received"], 0);
    assert!(status["last_message_at"].is_null());
}

#[tokio::test]
async fn test_status_reflects_traffic() {
    let state = make_state(BridgeConfig::default());
    let _client = state.registry.on_connect(None).unwrap();
    state.metrics.set_broker_state(SubscriptionState::Subscribed);
    state.metrics.record_message();
    let report = state.registry.broadcast(&Bytes::from("42.5"));
    state.metrics.record_broadcast(&report);

    let status = get_json(create_router(state), "/api/status").await;

    assert_eq!(status["broker"]["state"], "subscribed");
    assert_eq!(status["clients"]["open"], 1);
    assert_eq!(status["messages"]["received"], 1);
    assert_eq!(status["messages"]["delivered"], 1);
    assert!(status["last_message_at"].is_string());
}

#[tokio::test]
async fn test_clients_listing() {
    let state = make_state(BridgeConfig::default());
    let client = state.registry.on_connect(None).unwrap();

    let clients = get_json(create_router(state), "/api/clients").await;
    let clients = clients.as_array().unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0]["id"], client.id().to_string());
    assert_eq!(clients[0]["state"], "open");
}

#[tokio::test]
async fn test_ws_route_uses_configured_path() {
    let mut config = BridgeConfig::default();
    config.listener.ws_path = "/ws".to_string();
    let app = create_router(make_state(config));

    let response = app.clone().oneshot(get_request("/ws")).await.unwrap();
    assert_ne!(response.status(), StatusCode::NOT_FOUND);
    assert_ne!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
