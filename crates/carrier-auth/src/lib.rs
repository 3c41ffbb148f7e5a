//! Carrier API authentication library
//!
//! Provides the credential lifecycle for every supported carrier: OAuth
//! client-credentials and authorization-code (PKCE) token acquisition,
//! a single-flight refreshing token manager, and the static-API-key
//! variant used by carriers without a token endpoint. This crate is a
//! standalone library with no dependency on any tracker; it can be
//! tested and used independently.
//!
//! Credential flow (OAuth carriers):
//! 1. Build a `TokenEndpoint` from the carrier's URL + client credentials
//! 2. Wrap it in a `TokenManager` with the configured refresh buffer
//! 3. Request paths call `TokenManager::access_token()`; the first caller
//!    past the expiry buffer performs the refresh, concurrent callers
//!    share its result
//! 4. On an upstream 401 the tracker calls `invalidate()` and retries once
//!
//! Carriers using the authorization-code grant additionally go through
//! `pkce::generate_verifier()` / `pkce::compute_challenge()` /
//! `pkce::build_authorization_url()` and seed the manager via
//! `TokenManager::install()` after `token::exchange_code()`.

pub mod credentials;
pub mod error;
pub mod pkce;
pub mod token;

pub use credentials::{CarrierAuth, Credential, TokenManager};
pub use error::{Error, Result};
pub use pkce::{build_authorization_url, compute_challenge, generate_verifier};
pub use token::{ClientCredentials, TokenEndpoint, TokenResponse, exchange_code};
