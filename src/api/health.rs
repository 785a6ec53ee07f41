use axum::{extract::State, Json};
use serde::Serialize;

use crate::connection_manager::ConnectionStats;
use crate::poll::PollBufferStats;
use crate::relay::RouterStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: ConnectionStats,
    pub poll_buffers: PollBufferStats,
    pub messages: RouterStatsSnapshot,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.relay.registry().stats(),
        poll_buffers: state.relay.buffers().stats(),
        messages: state.relay.router().stats(),
    })
}
