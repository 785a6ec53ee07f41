//! HTTP publish and poll handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::relay::{ChannelMessage, RelayIngress};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub channel: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct PostMessageResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub id: String,
    /// Replaces the buffer's subscription when present
    #[serde(default)]
    pub channels: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub success: bool,
    pub messages: Vec<ChannelMessage>,
}

/// POST /message - publish without an originating push connection
#[tracing::instrument(name = "http.post_message", skip(state, payload))]
pub async fn post_message(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<Json<PostMessageResponse>> {
    let Json(request) = payload?;

    tracing::debug!(channel = %request.channel, "HTTP client posted message to channel");
    state.relay.on_post(&request.channel, request.data, None).await;

    Ok(Json(PostMessageResponse { success: true }))
}

/// POST /fetch - drain the caller's poll buffer
#[tracing::instrument(name = "http.fetch", skip(state, payload))]
pub async fn fetch_messages(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FetchRequest>, JsonRejection>,
) -> Result<Json<FetchResponse>> {
    let Json(request) = payload?;

    if request.id.is_empty() {
        return Err(AppError::Validation("id must not be empty".to_string()));
    }

    let messages = state.relay.on_fetch(&request.id, request.channels).await;

    Ok(Json(FetchResponse {
        success: true,
        messages,
    }))
}
