//! Cached credentials and the single-flight token manager
//!
//! One `TokenManager` instance owns the credential for exactly one
//! carrier. The validity check is a read-lock fast path; the refresh
//! path takes the write lock and re-validates, so any number of
//! concurrent callers arriving at an expired credential produce exactly
//! one token-endpoint request and all share its result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::Secret;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::Result;
use crate::token::{TokenEndpoint, TokenResponse};

/// A cached carrier credential.
///
/// `expires_at` is absolute; `None` means the token never expires
/// (some sandbox token endpoints omit `expires_in`).
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    pub issued_at: Instant,
    pub expires_at: Option<Instant>,
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Convert a token endpoint response into a cached credential.
    pub fn from_response(response: TokenResponse, issued_at: Instant) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            issued_at,
            expires_at: response
                .expires_in
                .map(|secs| issued_at + Duration::from_secs(secs)),
            refresh_token: response.refresh_token,
        }
    }

    /// Whether the credential is still usable given the refresh buffer.
    ///
    /// A refresh is due exactly when `now >= expires_at - buffer`.
    pub fn is_fresh(&self, buffer: Duration) -> bool {
        match self.expires_at {
            None => true,
            Some(at) => match at.checked_sub(buffer) {
                Some(threshold) => Instant::now() < threshold,
                // Lifetime shorter than the buffer: always refresh
                None => false,
            },
        }
    }
}

/// Concurrency-safe credential source for one OAuth carrier.
pub struct TokenManager {
    endpoint: TokenEndpoint,
    client: reqwest::Client,
    request_timeout: Duration,
    refresh_buffer: Duration,
    credential: RwLock<Option<Credential>>,
}

impl TokenManager {
    /// Default proactive-refresh margin before actual expiry.
    pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(60);

    pub fn new(
        endpoint: TokenEndpoint,
        client: reqwest::Client,
        request_timeout: Duration,
        refresh_buffer: Duration,
    ) -> Self {
        Self {
            endpoint,
            client,
            request_timeout,
            refresh_buffer,
            credential: RwLock::new(None),
        }
    }

    /// Return a currently valid access token, refreshing if necessary.
    ///
    /// Refresh is single-flight: callers that lose the race for the
    /// write lock re-check the cache and reuse the winner's token. The
    /// manager itself never retries a failed refresh; the caller's
    /// executor decides whether the outer operation is retried.
    pub async fn access_token(&self) -> Result<String> {
        {
            let credential = self.credential.read().await;
            if let Some(c) = credential.as_ref() {
                if c.is_fresh(self.refresh_buffer) {
                    return Ok(c.access_token.clone());
                }
            }
        }

        let mut credential = self.credential.write().await;
        // Re-check: another caller may have refreshed while we waited
        if let Some(c) = credential.as_ref() {
            if c.is_fresh(self.refresh_buffer) {
                return Ok(c.access_token.clone());
            }
        }

        let held_refresh_token = credential.as_ref().and_then(|c| c.refresh_token.clone());
        let response = match held_refresh_token {
            Some(rt) => {
                self.endpoint
                    .refresh(&self.client, self.request_timeout, &rt)
                    .await?
            }
            None => self.endpoint.fetch(&self.client, self.request_timeout).await?,
        };

        let fresh = Credential::from_response(response, Instant::now());
        let token = fresh.access_token.clone();
        info!(endpoint = self.endpoint.url(), "obtained fresh access token");
        *credential = Some(fresh);
        Ok(token)
    }

    /// Clear the cached credential, forcing the next caller to refresh.
    pub async fn invalidate(&self) {
        let mut credential = self.credential.write().await;
        *credential = None;
        debug!(endpoint = self.endpoint.url(), "credential invalidated");
    }

    /// Seed the cache with an externally obtained token (e.g. the result
    /// of an authorization-code exchange).
    pub async fn install(&self, response: TokenResponse) {
        let mut credential = self.credential.write().await;
        *credential = Some(Credential::from_response(response, Instant::now()));
    }

    /// Snapshot of the cached credential, if any.
    pub async fn cached(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }
}

/// How a carrier authenticates tracking requests.
///
/// Two variants, not a hierarchy: bearer carriers decorate requests with
/// an `Authorization` header sourced from a refreshing manager; static-key
/// carriers inject the configured key as a query parameter and have
/// nothing to refresh.
pub enum CarrierAuth {
    /// OAuth bearer token with managed refresh
    Bearer(Arc<TokenManager>),
    /// Fixed API key injected as the named query parameter
    StaticKey {
        key: Secret<String>,
        param: &'static str,
    },
}

impl CarrierAuth {
    /// Whether a 401 can be answered by refreshing the credential.
    pub fn supports_refresh(&self) -> bool {
        matches!(self, CarrierAuth::Bearer(_))
    }

    /// Drop any cached credential. No-op for static keys.
    pub async fn invalidate(&self) {
        if let CarrierAuth::Bearer(manager) = self {
            manager.invalidate().await;
        }
    }
}
