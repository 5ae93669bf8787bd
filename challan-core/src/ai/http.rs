//! Shared HTTP plumbing for the hosted model API.
//!
//! All model calls are JSON POSTs against the Generative Language API.
//! Transient failures (timeouts, connection resets, 429/5xx) are retried
//! with exponential backoff; everything else is surfaced immediately.

use std::time::{Duration, Instant};

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ChallanError, Result};

/// Configuration for the model HTTP client.
#[derive(Debug, Clone)]
pub struct GenAiHttpConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
}

impl Default for GenAiHttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(5),
        }
    }
}

/// JSON POST client with retry and backoff.
pub struct GenAiHttpClient {
    client: Client,
    config: GenAiHttpConfig,
}

impl GenAiHttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: GenAiHttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .https_only(true)
            .build()
            .map_err(|e| {
                ChallanError::Classification(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// POST `body` to `url` with retry, parsing the JSON response.
    ///
    /// `wrap_err` maps failure text into the caller's error variant so that
    /// a failed classification call and a failed embedding call surface as
    /// different members of the taxonomy.
    pub async fn post_json<B, R, F>(
        &self,
        url: &str,
        api_key: &str,
        body: &B,
        op: &str,
        wrap_err: F,
    ) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
        F: Fn(String) -> ChallanError + Send + Sync,
    {
        let backoff = self.build_backoff();

        retry_notify(
            backoff,
            || {
                let wrap_err = &wrap_err;
                async move { self.post_once::<B, R, _>(url, api_key, body, op, wrap_err).await }
            },
            |err: ChallanError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn post_once<B, R, F>(
        &self,
        url: &str,
        api_key: &str,
        body: &B,
        op: &str,
        wrap_err: &F,
    ) -> std::result::Result<R, backoff::Error<ChallanError>>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
        F: Fn(String) -> ChallanError,
    {
        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let latency_ms = start.elapsed().as_millis();
                if is_transient_error(&e) {
                    warn!(error = %e, op, latency_ms = latency_ms as u64, "Transient error, will retry");
                    backoff::Error::transient(wrap_err(format!("Transient error (will retry): {e}")))
                } else {
                    warn!(error = %e, op, latency_ms = latency_ms as u64, "Permanent error, aborting");
                    backoff::Error::permanent(wrap_err(format!("{op} request failed: {e}")))
                }
            })?;

        let status = response.status();
        debug!(status = %status, op, "Received HTTP response");

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let err = wrap_err(format!("{op} returned status {status}: {detail}"));
            return if is_transient_status(status) {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let parsed: R = response.json().await.map_err(|e| {
            warn!(error = %e, op, "Failed to parse JSON response");
            backoff::Error::permanent(wrap_err(format!("Failed to parse {op} response: {e}")))
        })?;

        let latency_ms = start.elapsed().as_millis();
        debug!(latency_ms = latency_ms as u64, op, "Request completed successfully");

        Ok(parsed)
    }

    /// Fetch raw bytes from a URL, used to inline remote images.
    pub async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let response = self.client.get(url).send().await.map_err(|e| {
            ChallanError::Classification(format!("Image fetch failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(ChallanError::Classification(format!(
                "Image fetch returned status: {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let bytes = response.bytes().await.map_err(|e| {
            ChallanError::Classification(format!("Failed to read image body: {e}"))
        })?;

        Ok((bytes.to_vec(), content_type))
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
