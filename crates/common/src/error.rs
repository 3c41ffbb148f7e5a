//! Common error types

use thiserror::Error;

/// Common error type for configuration loading
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let config_err = Error::Config("missing listen_addr".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: missing listen_addr"
        );

        let cred_err = Error::MissingCredential("FEDEX_CLIENT_SECRET".into());
        assert_eq!(
            cred_err.to_string(),
            "Missing credential: FEDEX_CLIENT_SECRET"
        );
    }

    #[test]
    fn error_debug_includes_variant() {
        let err = Error::MissingCredential("ONTRAC_API_KEY".into());
        let debug = format!("{err:?}");
        assert!(
            debug.contains("MissingCredential"),
            "Debug should include variant name, got: {debug}"
        );
    }
}
