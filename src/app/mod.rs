use crate::api::{ApiServer, BotState, MeetingState, UploadState};
use crate::baas::{BotService, MeetingBaasClient};
use crate::bot::{BotRegistry, StatusStreamEngine, WebhookIngestor};
use crate::config::Config;
use crate::db::Store;
use crate::media::{LocalMediaStore, MediaStore};
use crate::summarize::{GeminiSummarizer, Summarizer};
use crate::transcription::{build_speech_to_text, SpeechToText};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub async fn run_service() -> Result<()> {
    info!("Starting MeetRelay service");

    let config = Config::load()?;

    let store = Store::open_default()?;
    let registry = Arc::new(BotRegistry::new());
    let engine = StatusStreamEngine::new(
        Arc::clone(&registry),
        store.clone(),
        Duration::from_secs(config.stream.confirm_timeout_seconds),
    );
    let ingestor = Arc::new(WebhookIngestor::new(Arc::clone(&registry), store.clone()));

    let baas: Arc<dyn BotService> = Arc::new(MeetingBaasClient::new(&config.bot_service));
    let summarizer: Arc<dyn Summarizer> = Arc::new(GeminiSummarizer::new(&config.summarizer));
    let speech: Arc<dyn SpeechToText> = Arc::from(build_speech_to_text(&config.transcription)?);
    let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(crate::global::uploads_dir()?));

    let api_server = ApiServer::new(
        &config.server,
        BotState {
            registry: Arc::clone(&registry),
            store: store.clone(),
            engine,
            baas: Arc::clone(&baas),
        },
        MeetingState {
            store: store.clone(),
            baas,
            summarizer: Arc::clone(&summarizer),
        },
        UploadState {
            store,
            speech,
            summarizer,
            media,
        },
        ingestor,
    );

    api_server.start().await
}
