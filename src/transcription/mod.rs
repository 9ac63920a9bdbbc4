//! Speech-to-text for uploaded recordings.
//!
//! Uploaded audio takes a different path from live meetings: the bot
//! service transcribes meetings itself, while uploads go through the
//! provider selected here.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::config::TranscriptionConfig;

mod assembly;

pub use assembly::AssemblyAiTranscriber;

/// Turns an audio file into speaker-attributed transcript lines,
/// one `Speaker X: text` line per utterance.
#[async_trait]
pub trait SpeechToText: Send + Sync + std::fmt::Debug {
    async fn transcribe_speakers(&self, audio_path: &Path) -> Result<Vec<String>>;
}

/// Builds the configured speech-to-text provider.
pub fn build_speech_to_text(config: &TranscriptionConfig) -> Result<Box<dyn SpeechToText>> {
    let provider: Box<dyn SpeechToText> = match config.provider.as_str() {
        "assembly-ai" => {
            let api_key = config
                .api_key
                .clone()
                .context("api_key is required for the assembly-ai provider")?;

            Box::new(AssemblyAiTranscriber::new(
                api_key,
                config.api_endpoint.clone(),
                config.language.clone(),
            ))
        }
        other => bail!(
            "Unknown transcription provider '{}'. Supported providers: assembly-ai",
            other
        ),
    };

    info!("Using {} for upload transcription", config.provider);
    Ok(provider)
}
