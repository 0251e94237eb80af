//! Configuration for the ingestion service
//!
//! Values come from `LUMENS_*` environment variables, with `.env` files
//! loaded first (existing variables are never overridden).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{IngestionError, Result};
use crate::http_client::HttpClientConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Upstream API
    pub yt_api_key: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub yt_api_base_url: String,
    pub relevance_language: Option<String>,

    // Sources and outputs
    #[serde(default = "default_channels_csv")]
    pub channels_csv: PathBuf,
    #[serde(default = "default_out_prefix")]
    pub out_prefix: PathBuf,
    #[serde(default = "default_limit_per_source")]
    pub limit_per_source: usize,
    #[serde(default = "default_true")]
    pub enrich: bool,
    #[serde(default = "default_true")]
    pub incremental: bool,

    // Persisted state (watermarks, channel map)
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    // HTTP behaviour
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: f64,
    pub requests_per_minute: Option<u32>,

    // Storage sink
    #[serde(default = "default_sink_type")]
    pub sink_type: String,
    #[serde(default = "default_sink_dir")]
    pub sink_dir: PathBuf,
    pub database_url: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub gate_watermark_on_sink: bool,

    // Metrics
    pub metrics_textfile: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_channels_csv() -> PathBuf {
    PathBuf::from("data/channels/sources.csv")
}

fn default_out_prefix() -> PathBuf {
    PathBuf::from("out/yt_videos")
}

fn default_limit_per_source() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./data/state")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    4
}

fn default_retry_initial_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    5000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_retry_jitter() -> f64 {
    0.0
}

fn default_sink_type() -> String {
    "none".to_string()
}

fn default_sink_dir() -> PathBuf {
    PathBuf::from("./data/content")
}

fn default_collection() -> String {
    "content".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        Self::from_environment(config::Environment::with_prefix("LUMENS"))
    }

    /// Builds a config from an environment source (tests inject a map here)
    pub fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(IngestionError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        match self.sink_type.as_str() {
            "none" | "" | "filesystem" | "local" => {}
            "postgres" if self.database_url.is_none() => {
                return Err(IngestionError::InvalidConfig(
                    "postgres sink requires LUMENS_DATABASE_URL".to_string(),
                ));
            }
            "postgres" => {}
            other => {
                return Err(IngestionError::InvalidConfig(format!(
                    "unknown sink type: {}",
                    other
                )));
            }
        }
        Ok(())
    }

    /// Returns the API key or the error the CLI reports when it is missing
    pub fn api_key(&self) -> Result<&str> {
        self.yt_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(IngestionError::MissingApiKey)
    }

    /// HTTP client settings derived from this config
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_attempts: self.max_attempts,
            initial_retry_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_retry_delay: Duration::from_millis(self.retry_max_delay_ms),
            retry_multiplier: self.retry_multiplier,
            retry_jitter: self.retry_jitter,
            requests_per_minute: self.requests_per_minute,
            ..Default::default()
        }
    }
}
