//! Resilient HTTP execution with retry, backoff, and rate-limit handling
//!
//! Executes one logical carrier call with bounded retries:
//! - 429: honor `Retry-After` (default 60 s), retry while attempts
//!   remain, then fail with `RateLimit`
//! - 5xx and timeouts: exponential backoff (`2^attempt + 1` seconds)
//! - other transport errors (refused connection, DNS): terminal at once
//! - 2xx and non-429 4xx: returned untouched for the caller to interpret
//!
//! An optional deadline bounds the whole operation including backoff
//! sleeps; no call here runs unbounded.

use std::time::{Duration, Instant};

use reqwest::Method;
use tracing::{debug, warn};

use crate::error::{Result, TrackingError};
use crate::model::Carrier;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// One carrier HTTP request, described declaratively so the executor can
/// rebuild it per attempt.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Decorate with an `Authorization: Bearer …` header.
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Issues one logical HTTP call with bounded retries and carrier-scoped
/// error context. Shares one `reqwest::Client` (connection pool); each
/// attempt's connection is released on every exit path.
pub struct ResilientExecutor {
    client: reqwest::Client,
    carrier: Carrier,
    timeout: Duration,
    max_retries: u32,
}

impl ResilientExecutor {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub fn new(
        client: reqwest::Client,
        carrier: Carrier,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            carrier,
            timeout,
            max_retries: max_retries.max(1),
        }
    }

    /// Execute with no overall deadline (per-attempt timeout still applies).
    pub async fn send(&self, spec: &RequestSpec) -> Result<reqwest::Response> {
        self.send_with_deadline(spec, None).await
    }

    /// Execute, aborting retries (and their backoff sleeps) once the
    /// deadline would be crossed.
    pub async fn send_with_deadline(
        &self,
        spec: &RequestSpec,
        deadline: Option<Instant>,
    ) -> Result<reqwest::Response> {
        let mut last_error = String::new();

        for attempt in 0..self.max_retries {
            let request = self.build(spec)?;
            debug!(
                carrier = %self.carrier,
                url = spec.url(),
                attempt = attempt + 1,
                "sending carrier request"
            );

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();

                    if status.as_u16() == 429 {
                        let wait = retry_after(response.headers());
                        warn!(
                            carrier = %self.carrier,
                            wait_secs = wait.as_secs(),
                            "rate limited, backing off"
                        );
                        if attempt + 1 < self.max_retries {
                            self.pause(wait, deadline).await?;
                            continue;
                        }
                        return Err(TrackingError::RateLimit {
                            carrier: self.carrier,
                        });
                    }

                    if status.is_server_error() && attempt + 1 < self.max_retries {
                        let wait = backoff_delay(attempt);
                        warn!(
                            carrier = %self.carrier,
                            status = status.as_u16(),
                            wait_secs = wait.as_secs(),
                            "server error, retrying"
                        );
                        self.pause(wait, deadline).await?;
                        continue;
                    }

                    // 2xx, non-429 4xx, and a final 5xx are the caller's
                    // to interpret
                    return Ok(response);
                }
                Err(err) if err.is_timeout() => {
                    last_error = err.to_string();
                    if attempt + 1 < self.max_retries {
                        let wait = backoff_delay(attempt);
                        warn!(
                            carrier = %self.carrier,
                            wait_secs = wait.as_secs(),
                            "request timed out, retrying"
                        );
                        self.pause(wait, deadline).await?;
                        continue;
                    }
                }
                Err(err) => {
                    // Connection refused, DNS failure, TLS: not retryable
                    return Err(TrackingError::Request {
                        carrier: self.carrier,
                        message: format!("transport error: {err}"),
                    });
                }
            }
        }

        Err(TrackingError::Request {
            carrier: self.carrier,
            message: format!(
                "request failed after {} attempts: {last_error}",
                self.max_retries
            ),
        })
    }

    fn build(&self, spec: &RequestSpec) -> Result<reqwest::Request> {
        let mut builder = self
            .client
            .request(spec.method.clone(), &spec.url)
            .timeout(self.timeout);
        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }
        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &spec.body {
            builder = builder.json(body);
        }
        builder.build().map_err(|err| TrackingError::Request {
            carrier: self.carrier,
            message: format!("failed to build request: {err}"),
        })
    }

    async fn pause(&self, wait: Duration, deadline: Option<Instant>) -> Result<()> {
        if let Some(deadline) = deadline {
            if Instant::now() + wait >= deadline {
                return Err(TrackingError::Request {
                    carrier: self.carrier,
                    message: "deadline exceeded while waiting to retry".into(),
                });
            }
        }
        tokio::time::sleep(wait).await;
        Ok(())
    }
}

/// Exponential backoff for attempt `n` (0-based): `2^n + 1` seconds.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt.min(16)) + 1)
}

/// `Retry-After` header in seconds, defaulting to 60 when absent or
/// unparseable.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get("Retry-After")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
