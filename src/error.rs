//! Error types for the ingestion pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Source list error: {0}")]
    SourceListError(#[from] csv::Error),

    #[error("API error: HTTP {status} - {message} (reason: {})", reason.as_deref().unwrap_or("unknown"))]
    ApiError {
        status: u16,
        reason: Option<String>,
        message: String,
    },

    #[error("Giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing API key (set LUMENS_YT_API_KEY or pass --api-key)")]
    MissingApiKey,

    #[error("State error: {0}")]
    StateError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl IngestionError {
    /// Upstream reasons that will not change by retrying the same request
    pub fn is_permanent(&self) -> bool {
        match self {
            IngestionError::ApiError { reason: Some(reason), .. } => matches!(
                reason.as_str(),
                "quotaExceeded"
                    | "dailyLimitExceeded"
                    | "keyInvalid"
                    | "accessNotConfigured"
                    | "forbidden"
                    | "badRequest"
                    | "invalidParameter"
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;
