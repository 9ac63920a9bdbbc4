//! Meeting bot control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Launching a bot and streaming its status (POST /start-meeting-bot)
//! - Removing a bot from its meeting (DELETE /remove-meeting-bot)
//!
//! The launch response body is a newline-delimited JSON stream that
//! stays open until the bot reaches a terminal state.

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{delete, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::baas::BotService;
use crate::bot::{BotRegistry, StatusStreamEngine};
use crate::db::Store;

/// Shared state for bot control routes.
#[derive(Clone)]
pub struct BotState {
    pub registry: Arc<BotRegistry>,
    pub store: Store,
    pub engine: StatusStreamEngine,
    pub baas: Arc<dyn BotService>,
}

#[derive(Debug, Deserialize)]
pub struct StartBotRequest {
    #[serde(default)]
    pub meeting_url: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveBotRequest {
    #[serde(default)]
    pub bot_id: String,
}

pub fn router(state: BotState) -> Router {
    Router::new()
        .route("/start-meeting-bot", post(start_meeting_bot))
        .route("/remove-meeting-bot", delete(remove_meeting_bot))
        .with_state(state)
}

async fn start_meeting_bot(
    State(state): State<BotState>,
    Json(request): Json<StartBotRequest>,
) -> ApiResult<Response> {
    if request.meeting_url.trim().is_empty() || request.user_id.trim().is_empty() {
        return Err(ApiError::bad_request(
            "meeting_url and user_id are required",
        ));
    }

    let bot_id = state.baas.launch(&request.meeting_url).await?;
    info!("Bot {} launched for user {}", bot_id, request.user_id);

    state
        .registry
        .register(&bot_id, &request.user_id, &request.meeting_url)
        .await
        .map_err(|error| ApiError::internal(error.to_string()))?;

    if let Err(error) = state
        .store
        .register_bot(&request.user_id, &bot_id, &request.meeting_url)
        .await
    {
        warn!("Failed to persist registration of bot {}: {}", bot_id, error);
    }

    let stream = state.engine.event_stream(bot_id);
    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(stream),
    )
        .into_response())
}

async fn remove_meeting_bot(
    State(state): State<BotState>,
    Json(request): Json<RemoveBotRequest>,
) -> ApiResult<Json<Value>> {
    if request.bot_id.trim().is_empty() {
        return Err(ApiError::bad_request("bot_id is required"));
    }

    state.baas.remove(&request.bot_id).await?;
    info!("Bot {} removal requested", request.bot_id);

    Ok(Json(json!({ "message": "Bot removed successfully" })))
}
