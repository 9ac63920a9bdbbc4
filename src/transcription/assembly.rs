//! AssemblyAI speech-to-text with speaker diarization.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

use super::SpeechToText;

const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com/v2";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct TranscriptRequest {
    audio_url: String,
    speaker_labels: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: TranscriptStatus,
    text: Option<String>,
    error: Option<String>,
    utterances: Option<Vec<Utterance>>,
}

#[derive(Debug, Deserialize)]
struct Utterance {
    speaker: String,
    text: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

#[derive(Debug)]
pub struct AssemblyAiTranscriber {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    language: Option<String>,
}

impl AssemblyAiTranscriber {
    pub fn new(api_key: String, endpoint: Option<String>, language: Option<String>) -> Self {
        let base_url = endpoint.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let language = language.filter(|code| !code.is_empty() && code != "auto");

        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            language,
        }
    }

    /// Upload the audio file and get back a URL the transcript job can read.
    async fn upload_audio(&self, audio_path: &Path) -> Result<String> {
        debug!("Uploading audio file for transcription: {:?}", audio_path);

        let audio_data = tokio::fs::read(audio_path)
            .await
            .context("Failed to read audio file")?;

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(audio_data)
            .send()
            .await
            .context("Failed to upload audio for transcription")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read upload response body")?;

        if !status.is_success() {
            error!("Audio upload failed with status {}: {}", status, response_text);
            return Err(anyhow::anyhow!(
                "Audio upload failed with status {}",
                status
            ));
        }

        let upload: UploadResponse =
            serde_json::from_str(&response_text).context("Failed to parse upload response")?;
        Ok(upload.upload_url)
    }

    /// Submit a diarized transcription job.
    async fn submit_transcription(&self, audio_url: String) -> Result<String> {
        let request_body = TranscriptRequest {
            audio_url,
            speaker_labels: true,
            language_code: self.language.clone(),
        };

        let response = self
            .client
            .post(format!("{}/transcript", self.base_url))
            .header("Authorization", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to submit transcription request")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read transcription response body")?;

        if !status.is_success() {
            error!(
                "Transcription request failed with status {}: {}",
                status, response_text
            );
            return Err(anyhow::anyhow!(
                "Transcription request failed with status {}",
                status
            ));
        }

        let transcript: TranscriptResponse = serde_json::from_str(&response_text)
            .context("Failed to parse transcription response")?;

        debug!("Transcription submitted with id {}", transcript.id);
        Ok(transcript.id)
    }

    /// Poll until the job completes and return its speaker lines.
    async fn poll_transcription(&self, transcript_id: &str) -> Result<Vec<String>> {
        let poll_url = format!("{}/transcript/{}", self.base_url, transcript_id);
        let poll_interval = Duration::from_secs(3);
        let max_attempts = 120;

        for attempt in 1..=max_attempts {
            debug!(
                "Polling transcription {} (attempt {}/{})",
                transcript_id, attempt, max_attempts
            );

            let transcript: TranscriptResponse = self
                .client
                .get(&poll_url)
                .header("Authorization", &self.api_key)
                .send()
                .await
                .context("Failed to poll transcription status")?
                .json()
                .await
                .context("Failed to parse poll response")?;

            match transcript.status {
                TranscriptStatus::Completed => {
                    let lines = speaker_lines(&transcript);
                    info!(
                        "Transcription {} complete with {} utterances",
                        transcript_id,
                        lines.len()
                    );
                    return Ok(lines);
                }
                TranscriptStatus::Error => {
                    let message = transcript
                        .error
                        .unwrap_or_else(|| "Unknown error".to_string());
                    error!("Transcription {} failed: {}", transcript_id, message);
                    return Err(anyhow::anyhow!("Transcription failed: {}", message));
                }
                TranscriptStatus::Queued | TranscriptStatus::Processing => {
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }

        Err(anyhow::anyhow!(
            "Transcription timed out after {} attempts",
            max_attempts
        ))
    }
}

/// One line per utterance. Falls back to the flat transcript text when
/// the provider returns no utterances at all.
fn speaker_lines(transcript: &TranscriptResponse) -> Vec<String> {
    let lines: Vec<String> = transcript
        .utterances
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|utterance| format!("Speaker {}: {}", utterance.speaker, utterance.text))
        .collect();

    if lines.is_empty() {
        return transcript
            .text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| vec![text.to_string()])
            .unwrap_or_default();
    }
    lines
}

#[async_trait]
impl SpeechToText for AssemblyAiTranscriber {
    async fn transcribe_speakers(&self, audio_path: &Path) -> Result<Vec<String>> {
        info!("Transcribing uploaded audio: {:?}", audio_path);

        let audio_url = self.upload_audio(audio_path).await?;
        let transcript_id = self.submit_transcription(audio_url).await?;
        self.poll_transcription(&transcript_id).await
    }
}
