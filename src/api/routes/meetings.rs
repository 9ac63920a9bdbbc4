//! Meeting data and summary endpoints.
//!
//! Provides HTTP endpoints for:
//! - Fetching (and summarizing on first request) a bot's meeting data
//!   (GET /meeting_data)
//! - Listing a user's bot documents (GET /meetings)
//! - Fetching a user's most recent summary (GET /last_meeting_summary)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::required_param;
use crate::api::error::{ApiError, ApiResult};
use crate::baas::BotService;
use crate::db::{NewSummary, Store};
use crate::summarize::{summarize_or_fallback, Summarizer};
use crate::transcript;

/// Shared state for meeting data routes.
#[derive(Clone)]
pub struct MeetingState {
    pub store: Store,
    pub baas: Arc<dyn BotService>,
    pub summarizer: Arc<dyn Summarizer>,
}

pub fn router(state: MeetingState) -> Router {
    Router::new()
        .route("/meeting_data", get(meeting_data))
        .route("/meetings", get(list_meetings))
        .route("/last_meeting_summary", get(last_meeting_summary))
        .with_state(state)
}

/// Returns the bot document with its summaries. The first request after
/// a meeting ends pulls the raw data from the bot service, consolidates
/// the transcript, summarizes it, and stores the result; later requests
/// serve the stored records.
async fn meeting_data(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<MeetingState>,
) -> ApiResult<Json<Value>> {
    let bot_id = required_param(&params, "bot_id")?;
    let user_id = required_param(&params, "user_id")?;

    let bot_data = state
        .store
        .get_bot(user_id, bot_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No such bot document!"))?;

    let cached = state.store.list_summaries(user_id, bot_id).await?;
    if !cached.is_empty() {
        return Ok(Json(json!({
            "bot_data": bot_data,
            "meeting_summary": cached,
        })));
    }

    let meeting = state.baas.meeting_data(bot_id).await?;
    let transcription = transcript::consolidate(&meeting);
    let summary =
        summarize_or_fallback(state.summarizer.as_ref(), &transcription.join("\n"), "meeting")
            .await;
    let mp4_url = meeting
        .mp4_url()
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_GATEWAY,
                "Meeting data contained no recording URL",
            )
        })?
        .to_string();

    info!("Summarized meeting for bot {}", bot_id);

    let record = state
        .store
        .append_summary(
            user_id,
            bot_id,
            NewSummary {
                attendees: meeting.attendees.clone(),
                transcription,
                summary,
                mp4_url,
            },
        )
        .await?;

    Ok(Json(json!({
        "bot_data": bot_data,
        "meeting_summary": record,
    })))
}

async fn list_meetings(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<MeetingState>,
) -> ApiResult<Json<Value>> {
    let user_id = required_param(&params, "user_id")?;
    let bots = state.store.list_bots(user_id).await?;
    Ok(Json(json!(bots)))
}

async fn last_meeting_summary(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<MeetingState>,
) -> ApiResult<Json<Value>> {
    let user_id = required_param(&params, "user_id")?;
    let summary = state
        .store
        .latest_summary(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No meeting summaries found for the user"))?;
    Ok(Json(json!({ "meeting_summary": summary })))
}
