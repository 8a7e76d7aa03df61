use crate::core::config::RetryConfig;
use crate::core::error::{AcquisitionError, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry with linear backoff: after failed attempt `n` the policy waits
/// `base_delay * n` before trying again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        RetryPolicy::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn delay_for(&self, attempt: usize) -> Duration {
        self.base_delay * attempt as u32
    }

    /// Runs `operation` until it succeeds or `max_attempts` runs have failed.
    /// The last error is returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(val) => return Ok(val),
                Err(err) => {
                    warn!(
                        "Attempt {}/{} failed: {}",
                        attempt, self.max_attempts, err
                    );
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    debug!("Retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `max_attempts`: Total number of runs, at least one
/// - `base_delay_ms`: Delay unit in milliseconds, multiplied by the attempt number
///
/// # Returns
/// Either the successful result or the error of the final attempt
pub async fn with_retry<F, Fut, T, E>(
    operation: F,
    max_attempts: usize,
    base_delay_ms: u64,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms))
        .execute(operation)
        .await
}

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("cpidata/0.1")
        .timeout(timeout)
        .build()
        .map_err(|e| AcquisitionError::network("client", e))
}

pub fn build_url(base: &str, params: &[(&str, &str)]) -> Result<Url> {
    let parsed = if params.is_empty() {
        Url::parse(base)
    } else {
        Url::parse_with_params(base, params)
    };
    parsed.map_err(|e| AcquisitionError::InvalidInput(format!("Invalid URL {base}: {e}")))
}

/// Query parameters whose values never appear in logs or errors.
const SECRET_PARAMS: [&str; 2] = ["api_key", "token"];

fn is_secret(param: &str) -> bool {
    SECRET_PARAMS.iter().any(|secret| *secret == param)
}

/// `url` with secret query values masked, for logs and error messages.
pub fn redacted_url(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| is_secret(&k)) {
        return url.to_string();
    }
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if is_secret(&k) {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

/// Performs a GET under the retry policy and returns the body bytes.
///
/// Only transport and status failures are retried.
pub async fn get_bytes(client: &reqwest::Client, url: &Url, retry: &RetryPolicy) -> Result<Vec<u8>> {
    let shown = redacted_url(url);
    debug!("Requesting {}", shown);
    retry
        .execute(|| async {
            let response = client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| AcquisitionError::network(shown.as_str(), e.without_url()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(AcquisitionError::network_msg(
                    shown.as_str(),
                    format!("HTTP error: {status}"),
                ));
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| AcquisitionError::network(shown.as_str(), e.without_url()))?;
            Ok(body.to_vec())
        })
        .await
}

/// GETs `url` and decodes the body as `T`. Shape mismatches are not retried.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    retry: &RetryPolicy,
) -> Result<T> {
    let body = get_bytes(client, url, retry).await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AcquisitionError::unexpected(url.path(), "empty response body"));
    }
    serde_json::from_slice(&body).map_err(|e| AcquisitionError::unexpected(url.path(), e))
}
