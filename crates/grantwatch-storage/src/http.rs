//! HTTP fetch layer shared by all source adapters: one client, a
//! bounded retry policy, and status/transport-error classification.

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use grantwatch_core::Source;
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

/// Bounded exponential backoff for transient fetch failures.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl FetchPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub policy: FetchPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: "grantwatch-bot/0.1".to_string(),
            policy: FetchPolicy::default(),
        }
    }
}

/// One fetched page or payload, with the post-redirect URL preserved so
/// relative links can be resolved against where the content actually
/// came from.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub final_url: String,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("unparseable response body from {url}")]
    InvalidBody { url: String },
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: FetchPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            policy: config.policy,
        })
    }

    /// GET a page as text, retrying transient failures.
    pub async fn get_text(&self, source: Source, url: &str) -> Result<FetchedPage, FetchError> {
        self.send_with_retries(source, url, || self.client.get(url))
            .await
    }

    /// POST a JSON payload and return the parsed JSON response.
    pub async fn post_json(
        &self,
        source: Source,
        url: &str,
        payload: &JsonValue,
    ) -> Result<JsonValue, FetchError> {
        let page = self
            .send_with_retries(source, url, || self.client.post(url).json(payload))
            .await?;
        serde_json::from_str(&page.body).map_err(|err| {
            debug!(source = %source, url, %err, "response body was not valid JSON");
            FetchError::InvalidBody {
                url: page.final_url,
            }
        })
    }

    async fn send_with_retries(
        &self,
        source: Source,
        url: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<FetchedPage, FetchError> {
        let mut last_request_error: Option<reqwest::Error> = None;

        for attempt in 0..=self.policy.max_retries {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();

                    if status.is_success() {
                        let body = resp.text().await?;
                        return Ok(FetchedPage {
                            status,
                            final_url,
                            body,
                            fetched_at: Utc::now(),
                        });
                    }

                    if classify_status(status) == RetryDisposition::Retryable
                        && attempt < self.policy.max_retries
                    {
                        debug!(source = %source, url, %status, attempt, "retrying fetch");
                        tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
                        continue;
                    }

                    return Err(FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: final_url,
                    });
                }
                Err(err) => {
                    if classify_reqwest_error(&err) == RetryDisposition::Retryable
                        && attempt < self.policy.max_retries
                    {
                        debug!(source = %source, url, %err, attempt, "retrying fetch");
                        last_request_error = Some(err);
                        tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(FetchError::Request(err));
                }
            }
        }

        Err(FetchError::Request(
            last_request_error.expect("retry loop captures a request error before exhausting"),
        ))
    }
}
