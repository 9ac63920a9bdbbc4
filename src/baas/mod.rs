//! Client for the hosted meeting-bot service.
//!
//! Covers the three calls the service exposes: launching a bot into a
//! meeting, removing it, and fetching the raw meeting data once the call
//! has ended. Lifecycle updates come back separately through the webhook
//! endpoint, not through this client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::BotServiceConfig;
use crate::transcript::MeetingData;

const SERVICE: &str = "meeting bot service";

/// Failure talking to an upstream HTTP service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        source: reqwest::Error,
    },
}

impl UpstreamError {
    fn transport(source: reqwest::Error) -> Self {
        UpstreamError::Transport {
            service: SERVICE,
            source,
        }
    }
}

/// Operations the service needs from the bot provider. Split out so
/// tests can stand in for the real HTTP client.
#[async_trait]
pub trait BotService: Send + Sync {
    /// Launches a bot into the meeting and returns its id.
    async fn launch(&self, meeting_url: &str) -> Result<String, UpstreamError>;

    /// Removes the bot from its meeting.
    async fn remove(&self, bot_id: &str) -> Result<(), UpstreamError>;

    /// Fetches the raw meeting data recorded by the bot.
    async fn meeting_data(&self, bot_id: &str) -> Result<MeetingData, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct LaunchRequest<'a> {
    meeting_url: &'a str,
    bot_name: &'a str,
    recording_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bot_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_message: Option<&'a str>,
    reserved: bool,
    speech_to_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct LaunchResponse {
    bot_id: String,
}

/// HTTP client for the Meeting BaaS API.
pub struct MeetingBaasClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    bot_name: String,
    bot_image: Option<String>,
    entry_message: Option<String>,
    recording_mode: String,
    speech_to_text: String,
    reserved: bool,
}

impl MeetingBaasClient {
    pub fn new(config: &BotServiceConfig) -> Self {
        info!("Initialized bot service client for {}", config.api_url);

        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            bot_name: config.bot_name.clone(),
            bot_image: config.bot_image.clone(),
            entry_message: config.entry_message.clone(),
            recording_mode: config.recording_mode.clone(),
            speech_to_text: config.speech_to_text.clone(),
            reserved: config.reserved,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!("{} returned status {}: {}", SERVICE, status, body);
        Err(UpstreamError::Status {
            service: SERVICE,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl BotService for MeetingBaasClient {
    async fn launch(&self, meeting_url: &str) -> Result<String, UpstreamError> {
        debug!("Launching meeting bot into {}", meeting_url);

        let request_body = LaunchRequest {
            meeting_url,
            bot_name: &self.bot_name,
            recording_mode: &self.recording_mode,
            bot_image: self.bot_image.as_deref(),
            entry_message: self.entry_message.as_deref(),
            reserved: self.reserved,
            speech_to_text: &self.speech_to_text,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-spoke-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(UpstreamError::transport)?;

        let launch: LaunchResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(UpstreamError::transport)?;

        info!("Launched bot {} into {}", launch.bot_id, meeting_url);
        Ok(launch.bot_id)
    }

    async fn remove(&self, bot_id: &str) -> Result<(), UpstreamError> {
        debug!("Removing meeting bot {}", bot_id);

        let response = self
            .client
            .delete(format!("{}/{}", self.api_url, bot_id))
            .header("x-spoke-api-key", &self.api_key)
            .send()
            .await
            .map_err(UpstreamError::transport)?;

        Self::check(response).await?;
        info!("Removed bot {}", bot_id);
        Ok(())
    }

    async fn meeting_data(&self, bot_id: &str) -> Result<MeetingData, UpstreamError> {
        debug!("Fetching meeting data for bot {}", bot_id);

        let response = self
            .client
            .get(format!("{}/meeting_data", self.api_url))
            .query(&[("bot_id", bot_id)])
            .header("x-spoke-api-key", &self.api_key)
            .send()
            .await
            .map_err(UpstreamError::transport)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(UpstreamError::transport)
    }
}
