//! HTTP Client Module
//!
//! Provides a GET-only JSON client with:
//! - Bounded timeouts on every request
//! - Exponential backoff with a capped delay between attempts
//! - Optional client-side rate limiting
//!
//! Every upstream call is a read-only GET, so retrying is always safe.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{IngestionError, Result};
use crate::metrics;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub request_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    /// Initial retry delay
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// Retry multiplier for exponential backoff
    pub retry_multiplier: f64,
    /// Randomization factor applied to each delay (0 disables jitter)
    pub retry_jitter: f64,
    /// Client-side request cap
    pub requests_per_minute: Option<u32>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_attempts: 4,
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(5),
            retry_multiplier: 2.0,
            retry_jitter: 0.0,
            requests_per_minute: None,
            user_agent: format!("lumens-ingest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Error envelope returned by the upstream API on non-2xx responses
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

/// Resilient HTTP client with retries and optional rate limiting
pub struct ResilientHttpClient {
    /// Inner reqwest client
    client: Client,
    /// Optional client-side limiter
    rate_limiter: Option<DefaultDirectRateLimiter>,
    /// Configuration
    config: HttpClientConfig,
}

impl ResilientHttpClient {
    /// Creates a new resilient HTTP client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        let rate_limiter = config
            .requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// Creates a client with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Creates the backoff schedule for one logical request
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_retry_delay)
            .with_max_interval(self.config.max_retry_delay)
            .with_multiplier(self.config.retry_multiplier)
            .with_randomization_factor(self.config.retry_jitter)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Issues a GET and decodes the JSON body, retrying transient failures.
    ///
    /// `endpoint` is only used for logging and metrics labels.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut backoff = self.create_backoff();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if let Some(ref limiter) = self.rate_limiter {
                limiter.until_ready().await;
            }

            let error = match self.get_once::<T>(endpoint, url, query).await {
                Ok(value) => {
                    debug!(endpoint, attempt, "Request succeeded");
                    return Ok(value);
                }
                Err(e) if e.is_permanent() => {
                    warn!(endpoint, attempt, error = %e, "Permanent upstream error, not retrying");
                    return Err(e);
                }
                Err(e) => e,
            };

            if attempt >= max_attempts {
                warn!(endpoint, attempts = attempt, error = %error, "Request failed, giving up");
                return Err(IngestionError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or(self.config.max_retry_delay);
            warn!(
                endpoint,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient error, will retry"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One attempt: send, check status, decode
    async fn get_once<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = match self.client.get(url).query(query).send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_upstream_request(endpoint, "network_error");
                return Err(IngestionError::HttpError(e));
            }
        };

        let status = response.status();
        metrics::record_upstream_request(endpoint, status.as_str());

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::api_error(status, &body))
    }

    /// Builds an error from a non-2xx body, surfacing message and reason
    fn api_error(status: StatusCode, body: &str) -> IngestionError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => IngestionError::ApiError {
                status: status.as_u16(),
                reason: envelope.error.errors.into_iter().find_map(|e| e.reason),
                message: envelope.error.message.unwrap_or_default(),
            },
            Err(_) => IngestionError::ApiError {
                status: status.as_u16(),
                reason: None,
                message: body.chars().take(200).collect(),
            },
        }
    }
}
