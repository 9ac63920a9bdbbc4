//! Transcript summarization via Gemini.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::SummarizerConfig;

const DEFAULT_API_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Produces a prose summary of a consolidated transcript.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str, category: &str) -> Result<String>;
}

/// Summarizes with a fallback: a failed upstream call becomes an error
/// note in place of the summary instead of failing the request.
pub async fn summarize_or_fallback(
    summarizer: &dyn Summarizer,
    transcript: &str,
    category: &str,
) -> String {
    match summarizer.summarize(transcript, category).await {
        Ok(summary) => summary,
        Err(error) => {
            error!("Summarization failed: {}", error);
            format!("An unexpected error occurred: {}", error)
        }
    }
}

fn build_prompt(category: &str, transcript: &str) -> String {
    let intro = match category.trim() {
        "interview" => "Summarize the following interview transcript:",
        "meeting" => "Summarize the following meeting transcript:",
        "discussion" => "Summarize the following discussion transcript:",
        _ => "Summarize the following transcript:",
    };
    format!("{}\n{}", intro, transcript)
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Summarizer backed by the Gemini generateContent API.
pub struct GeminiSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiSummarizer {
    pub fn new(config: &SummarizerConfig) -> Self {
        let base_url = config
            .api_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());

        info!(
            "Initialized summarizer with model {} at {}",
            config.model, base_url
        );

        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url,
        }
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, transcript: &str, category: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let prompt = build_prompt(category, transcript);

        debug!("Requesting summary of {} transcript chars", transcript.len());

        let request_body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .context("Failed to reach the summarization API")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read summarization response body")?;

        if !status.is_success() {
            error!(
                "Summarization API returned status {}: {}",
                status, response_text
            );
            return Err(anyhow::anyhow!(
                "Summarization API returned status {}",
                status
            ));
        }

        let parsed: GenerateResponse = serde_json::from_str(&response_text)
            .context("Failed to parse summarization response")?;

        parsed
            .into_text()
            .context("Summarization response contained no text")
    }
}
