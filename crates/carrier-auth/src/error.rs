//! Error types for carrier authentication operations

/// Errors from credential acquisition and refresh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token request failed: {0}")]
    Transport(String),

    #[error("token request timed out")]
    Timeout,

    #[error("token endpoint rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed token response: {0}")]
    Malformed(String),
}

impl Error {
    /// HTTP status observed at the token endpoint, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
