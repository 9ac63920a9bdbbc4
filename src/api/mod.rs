//! REST API server for MeetRelay.
//!
//! Provides HTTP endpoints for:
//! - Bot control and live status streaming
//! - Bot lifecycle webhook deliveries
//! - Meeting data, summaries, and bot listings
//! - Uploaded-recording transcription

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{
    body::Bytes,
    http::Method,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::bot::WebhookIngestor;
use crate::config::ServerConfig;
use error::ApiError;

pub use routes::bots::BotState;
pub use routes::meetings::MeetingState;
pub use routes::uploads::UploadState;

pub struct ApiServer {
    host: String,
    port: u16,
    bots: BotState,
    meetings: MeetingState,
    uploads: UploadState,
    ingestor: Arc<WebhookIngestor>,
}

impl ApiServer {
    pub fn new(
        config: &ServerConfig,
        bots: BotState,
        meetings: MeetingState,
        uploads: UploadState,
        ingestor: Arc<WebhookIngestor>,
    ) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            bots,
            meetings,
            uploads,
            ingestor,
        }
    }

    pub async fn start(self) -> Result<()> {
        let fallback_ingestor = Arc::clone(&self.ingestor);
        let app = Router::new()
            // Root and version endpoints
            .route("/", get(status))
            .route("/version", get(version))
            // Bot control and data routes
            .merge(routes::bots::router(self.bots))
            .merge(routes::meetings::router(self.meetings))
            .merge(routes::uploads::router(self.uploads))
            .merge(routes::webhook::router(self.ingestor))
            // Delivery senders sometimes post to a configured sub-path, so
            // unmatched POST/PUT requests are treated as webhook traffic.
            .fallback(move |method: Method, body: Bytes| {
                let ingestor = Arc::clone(&fallback_ingestor);
                async move {
                    if method == Method::POST || method == Method::PUT {
                        routes::webhook::handle_delivery(ingestor.as_ref(), &body)
                            .await
                            .into_response()
                    } else {
                        ApiError::not_found("Not found").into_response()
                    }
                }
            })
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

        let listener =
            tokio::net::TcpListener::bind(&format!("{}:{}", self.host, self.port)).await?;

        info!("API server listening on http://{}:{}", self.host, self.port);
        info!("Endpoints:");
        info!("  GET    /                     - Service info");
        info!("  GET    /version              - Version info");
        info!("  POST   /start-meeting-bot    - Launch a bot, stream its status");
        info!("  DELETE /remove-meeting-bot   - Remove a bot from its meeting");
        info!("  POST   /webhook              - Bot lifecycle deliveries");
        info!("  GET    /meeting_data         - Meeting data with summary");
        info!("  GET    /meetings             - List a user's bot documents");
        info!("  GET    /last_meeting_summary - Most recent summary");
        info!("  POST   /transcribe           - Transcribe an uploaded MP3");
        info!("  GET    /uploads              - List uploads");
        info!("  DELETE /delete_upload        - Delete an upload record");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meetrelay",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "meetrelay"
    }))
}
