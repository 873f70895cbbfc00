//! HTTP transport for the DOAJ search API.
//!
//! The paginator only sees the [`Transport`] trait; [`HttpTransport`] is the
//! reqwest implementation with a per-request timeout and bounded retries
//! with exponential backoff on transient failures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// HTTP statuses retried before a page request is given up.
pub const DEFAULT_RETRY_STATUSES: [u16; 7] = [
    408, // Request Timeout
    422, // Unprocessable Content
    429, // Too Many Requests
    500, // Internal Server Error
    502, // Bad Gateway
    503, // Service Unavailable
    504, // Gateway Timeout
];

/// A page request that failed for good.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("cannot connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status {
        status: u16,
        url: String,
        /// Server-requested wait from a `Retry-After` header.
        retry_after: Option<Duration>,
    },

    #[error("invalid JSON from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl TransportError {
    fn is_retryable(&self, retry_statuses: &[u16]) -> bool {
        match self {
            TransportError::Timeout { .. } | TransportError::Connect { .. } => true,
            TransportError::Status { status, .. } => retry_statuses.contains(status),
            TransportError::Decode { .. } | TransportError::Request { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Source of JSON pages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` with the given query parameters and decode the JSON body.
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value, TransportError>;
}

/// Transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub retries: u32,
    pub backoff_base: Duration,
    pub retry_statuses: Vec<u16>,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 5,
            backoff_base: Duration::from_secs(1),
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            user_agent: crate::config::default_user_agent(),
        }
    }
}

impl From<&crate::config::ApiConfig> for TransportConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            retries: config.retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            retry_statuses: config.retry_statuses.clone(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Delay before retry number `retry_count` (0-indexed): `base * 2^retry_count`.
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(retry_count))
}

/// Parse a `Retry-After` value: delay-seconds or an HTTP date.
///
/// A date in the past means no wait.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// reqwest-backed transport.
pub struct HttpTransport {
    config: TransportConfig,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn get_once(&self, url: &str, params: &[(String, String)]) -> Result<Value, TransportError> {
        let response = self
            .http_client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        url: url.to_string(),
                        seconds: self.config.timeout.as_secs(),
                    }
                } else if e.is_connect() {
                    TransportError::Connect {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                } else {
                    TransportError::Request {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                retry_after,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                    seconds: self.config.timeout.as_secs(),
                }
            } else {
                TransportError::Decode {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            match self.get_once(url, params).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.config.retries && e.is_retryable(&self.config.retry_statuses) => {
                    let delay = e
                        .retry_after()
                        .unwrap_or_else(|| retry_delay(attempt, self.config.backoff_base));
                    warn!(
                        "{} (retry {}/{} in {:?})",
                        e,
                        attempt + 1,
                        self.config.retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!("Giving up on {} after {} attempt(s)", url, attempt + 1);
                    return Err(e);
                }
            }
        }
    }
}
