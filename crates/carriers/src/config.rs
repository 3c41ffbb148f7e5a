//! Carrier construction inputs
//!
//! Immutable configuration structs built once at process start and
//! passed by reference into each tracker constructor. No ambient global
//! settings exist anywhere in the workspace.

use std::time::Duration;

use common::Secret;

/// Credentials + environment for an OAuth carrier (FedEx, UPS, DHL).
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Use the carrier's sandbox host instead of production
    pub sandbox: bool,
}

/// Credentials + environment for OnTrac (static API key).
pub struct OntracConfig {
    pub api_key: Secret<String>,
    pub account_number: String,
    pub sandbox: bool,
}

/// Settings shared by every tracker.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    /// Per-attempt HTTP timeout
    pub request_timeout: Duration,
    /// Proactive token refresh margin before expiry
    pub refresh_buffer: Duration,
    /// Attempts per logical carrier call
    pub max_retries: u32,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            refresh_buffer: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}
