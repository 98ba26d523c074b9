use super::AppState;
use crate::broker::SubscriptionState;
use crate::fanout::ClientInfo;
use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// GET /api/status response
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub broker: BrokerStatus,
    pub clients: ClientStatus,
    pub messages: MessageStatus,
    pub last_message_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerStatus {
    pub url: String,
    pub topic: String,
    pub state: SubscriptionState,
    pub reconnects: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    pub open: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageStatus {
    pub received: u64,
    pub delivered: u64,
    pub pruned_clients: u64,
}

impl StatusResponse {
    fn collect(state: &AppState) -> Self {
        let snapshot = state.metrics.snapshot();
        Self {
            broker: BrokerStatus {
                url: state.config.broker.url.clone(),
                topic: state.config.broker.topic.clone(),
                state: snapshot.broker_state,
                reconnects: snapshot.broker_reconnects,
            },
            clients: ClientStatus {
                open: state.registry.len(),
                max: state.registry.max_clients(),
            },
            messages: MessageStatus {
                received: snapshot.messages_received,
                delivered: snapshot.deliveries,
                pruned_clients: snapshot.pruned_clients,
            },
            last_message_at: snapshot.last_message_at,
        }
    }
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse::collect(&state))
}

/// GET /api/clients - currently registered clients, oldest first
pub async fn get_clients(State(state): State<Arc<AppState>>) -> Json<Vec<ClientInfo>> {
    Json(state.registry.clients())
}

pub async fn health() -> &'static str {
    "ok"
}
