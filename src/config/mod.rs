use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub bot_service: BotServiceConfig,
    pub summarizer: SummarizerConfig,
    pub transcription: TranscriptionConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotServiceConfig {
    pub api_url: String,
    pub api_key: String,
    pub bot_name: String,
    pub bot_image: Option<String>,
    pub entry_message: Option<String>,
    pub recording_mode: String,
    pub speech_to_text: String,
    pub reserved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub api_key: String,
    pub model: String,
    pub api_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// How long a stream waits for the completion confirmation after the
    /// call ends before giving up on it.
    pub confirm_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5005,
        }
    }
}

impl Default for BotServiceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.meetingbaas.com/bots".to_string(),
            api_key: String::new(),
            bot_name: "MeetRelay Notetaker".to_string(),
            bot_image: None,
            entry_message: Some("I am here to take notes for this meeting".to_string()),
            recording_mode: "speaker_view".to_string(),
            speech_to_text: "Gladia".to_string(),
            reserved: false,
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            api_endpoint: None,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: "assembly-ai".to_string(),
            api_key: None,
            api_endpoint: None,
            language: Some("en".to_string()),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_seconds: 600,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 5005);
        assert_eq!(config.bot_service.recording_mode, "speaker_view");
        assert_eq!(config.transcription.provider, "assembly-ai");
        assert_eq!(config.stream.confirm_timeout_seconds, 600);
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config: Config = toml::from_str(
            "[server]\nport = 8080\n\n[summarizer]\napi_key = \"k\"\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.summarizer.api_key, "k");
        assert_eq!(config.summarizer.model, "gemini-1.5-flash");
    }
}
