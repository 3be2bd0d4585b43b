use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

const DEFAULT_HTTP_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_WS_URL: &str = "ws://127.0.0.1:5001/socket.io/?EIO=4&transport=websocket";

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub http_base_url: String,
    /// `None` disables the live-transcription stream entirely.
    pub stream_url: Option<String>,
    pub poll_interval: Duration,
    pub log_level: Level,
    /// TTS program invoked once per utterance; unset means muted.
    pub speech_command: Option<String>,
    /// Backend command to spawn at startup; unset means one is already running.
    pub backend_command: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let http_base_url =
            std::env::var("BACKEND_HTTP_URL").unwrap_or_else(|_| DEFAULT_HTTP_URL.to_string());

        let stream_url = match std::env::var("STREAM_WS_URL") {
            Ok(url) if url.is_empty() => None,
            Ok(url) => Some(url),
            Err(_) => Some(DEFAULT_WS_URL.to_string()),
        };

        let poll_interval_str =
            std::env::var("POLL_INTERVAL_MS").unwrap_or_else(|_| "1000".to_string());
        let poll_interval_ms = poll_interval_str.parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue("POLL_INTERVAL_MS".to_string(), e.to_string())
        })?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "POLL_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let speech_command = std::env::var("SPEECH_COMMAND").ok().filter(|c| !c.is_empty());
        let backend_command = std::env::var("BACKEND_COMMAND").ok().filter(|c| !c.is_empty());

        Ok(Self {
            http_base_url,
            stream_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            log_level,
            speech_command,
            backend_command,
        })
    }
}
