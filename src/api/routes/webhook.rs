//! Webhook endpoint for bot lifecycle deliveries.
//!
//! The bot service retries deliveries that do not get a 200 back, so
//! this endpoint always replies 200 with an acknowledgement body, even
//! for unreadable payloads. Accepts both POST and PUT since delivery
//! senders differ on the verb.

use axum::{body::Bytes, extract::State, response::Json, routing::post, Router};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::bot::{WebhookIngestor, WebhookReply};

pub fn router(ingestor: Arc<WebhookIngestor>) -> Router {
    Router::new()
        .route("/webhook", post(deliver).put(deliver))
        .with_state(ingestor)
}

async fn deliver(
    State(ingestor): State<Arc<WebhookIngestor>>,
    body: Bytes,
) -> Json<WebhookReply> {
    handle_delivery(ingestor.as_ref(), &body).await
}

/// Shared by the `/webhook` route and the catch-all fallback, which
/// accepts deliveries on any path.
pub(crate) async fn handle_delivery(ingestor: &WebhookIngestor, body: &[u8]) -> Json<WebhookReply> {
    Json(ingestor.ingest(parse_payload(body)).await)
}

/// Unparseable bodies become `null`, which the ingestor acknowledges
/// without acting on.
fn parse_payload(body: &[u8]) -> Value {
    match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(error) => {
            debug!("Webhook body was not valid JSON: {}", error);
            Value::Null
        }
    }
}
