//! Uploaded-recording endpoints.
//!
//! Provides HTTP endpoints for:
//! - Transcribing and summarizing an uploaded MP3 (POST /transcribe)
//! - Listing a user's uploads (GET /uploads)
//! - Deleting an upload record (DELETE /delete_upload)

use axum::{
    extract::{Multipart, Query, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::required_param;
use crate::api::error::{ApiError, ApiResult};
use crate::db::{NewUpload, Store};
use crate::media::MediaStore;
use crate::summarize::{summarize_or_fallback, Summarizer};
use crate::transcription::SpeechToText;

/// Shared state for upload routes.
#[derive(Clone)]
pub struct UploadState {
    pub store: Store,
    pub speech: Arc<dyn SpeechToText>,
    pub summarizer: Arc<dyn Summarizer>,
    pub media: Arc<dyn MediaStore>,
}

pub fn router(state: UploadState) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/uploads", get(list_uploads))
        .route("/delete_upload", delete(delete_upload))
        .with_state(state)
}

async fn transcribe(
    State(state): State<UploadState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<axum::body::Bytes> = None;
    let mut user_id: Option<String> = None;
    // Absent meeting_type falls back to the meeting summary template.
    let mut meeting_type = String::from("meeting");

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::bad_request(error.to_string()))?
    {
        // The field name borrow ends before the field is consumed below.
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|name| name.to_string());
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|error| ApiError::bad_request(error.to_string()))?,
                );
            }
            "user_id" => {
                user_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|error| ApiError::bad_request(error.to_string()))?,
                );
            }
            "meeting_type" => {
                meeting_type = field
                    .text()
                    .await
                    .map_err(|error| ApiError::bad_request(error.to_string()))?;
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::bad_request("No file part"))?;
    let file_name = file_name.unwrap_or_default();
    if !file_name.ends_with(".mp3") {
        return Err(ApiError::bad_request("File must be an MP3"));
    }
    let user_id = user_id
        .filter(|user_id| !user_id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("user_id is required"))?;

    let temp = tempfile::Builder::new()
        .suffix(".mp3")
        .tempfile()
        .map_err(|error| ApiError::internal(format!("Failed to stage upload: {}", error)))?;
    tokio::fs::write(temp.path(), &bytes)
        .await
        .map_err(|error| ApiError::internal(format!("Failed to stage upload: {}", error)))?;

    let media_path = state.media.save(temp.path(), &file_name).await?;
    let transcription = state.speech.transcribe_speakers(temp.path()).await?;
    let summary =
        summarize_or_fallback(state.summarizer.as_ref(), &transcription.join("\n"), &meeting_type)
            .await;

    info!("Transcribed upload {} for user {}", file_name, user_id);

    let record = state
        .store
        .add_upload(
            &user_id,
            NewUpload {
                file_name,
                media_path,
                transcription,
                summary,
            },
        )
        .await?;

    Ok(Json(json!({
        "transcription": record.transcription,
        "summary": record.summary,
    })))
}

async fn list_uploads(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<UploadState>,
) -> ApiResult<Json<Value>> {
    let user_id = required_param(&params, "user_id")?;
    let uploads = state.store.list_uploads(user_id).await?;
    Ok(Json(json!(uploads)))
}

async fn delete_upload(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<UploadState>,
) -> ApiResult<Json<Value>> {
    let user_id = required_param(&params, "user_id")?;
    let upload_id: i64 = required_param(&params, "upload_id")?
        .parse()
        .map_err(|_| ApiError::bad_request("upload_id must be an integer"))?;

    if state.store.delete_upload(user_id, upload_id).await? {
        info!("Upload {} deleted for user {}", upload_id, user_id);
        Ok(Json(json!({ "message": "Meeting deleted successfully!" })))
    } else {
        Err(ApiError::not_found("Meeting does not exist!"))
    }
}
