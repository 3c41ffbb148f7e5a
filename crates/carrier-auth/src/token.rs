//! OAuth token endpoint interactions
//!
//! All supported carriers exchange form-encoded POSTs for a JSON token
//! body, but they differ in where the client credentials travel: FedEx
//! and DHL put `client_id`/`client_secret` in the form body, UPS mandates
//! HTTP Basic authorization. `ClientCredentials` captures that split so
//! `TokenEndpoint` stays carrier-agnostic.

use std::time::Duration;

use common::Secret;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Response from a carrier token endpoint.
///
/// `expires_in` is a delta in seconds from the response time; the
/// credential cache converts it to an absolute instant when storing.
/// Carriers that issue non-expiring tokens omit it.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, deserialize_with = "flexible_seconds")]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Some carriers send `expires_in` as a JSON string rather than a number.
fn flexible_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Text(s)) => s.parse().ok(),
        None => None,
    })
}

/// How the OAuth client proves its identity at the token endpoint.
pub enum ClientCredentials {
    /// `client_id`/`client_secret` as form fields (FedEx, DHL)
    Form {
        client_id: String,
        client_secret: Secret<String>,
    },
    /// HTTP Basic authorization header (UPS)
    Basic {
        client_id: String,
        client_secret: Secret<String>,
    },
}

/// One carrier's token endpoint: URL plus client identity.
pub struct TokenEndpoint {
    url: String,
    credentials: ClientCredentials,
}

impl TokenEndpoint {
    pub fn new(url: impl Into<String>, credentials: ClientCredentials) -> Self {
        Self {
            url: url.into(),
            credentials,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Obtain a token via the `client_credentials` grant.
    pub async fn fetch(
        &self,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<TokenResponse> {
        debug!(url = %self.url, "requesting access token (client_credentials)");

        let mut form: Vec<(&str, &str)> = vec![("grant_type", "client_credentials")];
        let request = match &self.credentials {
            ClientCredentials::Form {
                client_id,
                client_secret,
            } => {
                form.push(("client_id", client_id));
                form.push(("client_secret", client_secret.expose_str()));
                client.post(&self.url).form(&form)
            }
            ClientCredentials::Basic {
                client_id,
                client_secret,
            } => client
                .post(&self.url)
                .basic_auth(client_id, Some(client_secret.expose_str()))
                .form(&form),
        };

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(map_send_error)?;
        read_token_response(response).await
    }

    /// Obtain a fresh token via the `refresh_token` grant.
    ///
    /// Used when a prior grant (e.g. authorization-code) handed out a
    /// refresh token; preferred over re-running the full grant.
    pub async fn refresh(
        &self,
        client: &reqwest::Client,
        timeout: Duration,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        debug!(url = %self.url, "refreshing access token (refresh_token)");

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let request = match &self.credentials {
            ClientCredentials::Form {
                client_id,
                client_secret,
            } => {
                form.push(("client_id", client_id));
                form.push(("client_secret", client_secret.expose_str()));
                client.post(&self.url).form(&form)
            }
            ClientCredentials::Basic {
                client_id,
                client_secret,
            } => client
                .post(&self.url)
                .basic_auth(client_id, Some(client_secret.expose_str()))
                .form(&form),
        };

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(map_send_error)?;
        read_token_response(response).await
    }
}

/// Exchange an authorization code for tokens (PKCE flow completion).
///
/// The verifier proves this client initiated the authorization; the
/// carrier compares its S256 hash against the challenge sent in the
/// authorization URL.
pub async fn exchange_code(
    client: &reqwest::Client,
    timeout: Duration,
    token_url: &str,
    client_id: &str,
    redirect_uri: &str,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    debug!(url = token_url, "exchanging authorization code");

    let response = client
        .post(token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
        ])
        .timeout(timeout)
        .send()
        .await
        .map_err(map_send_error)?;

    read_token_response(response).await
}

fn map_send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Transport(err.to_string())
    }
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            message: body,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::Malformed(e.to_string()))
}
