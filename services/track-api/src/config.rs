//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Carrier secrets are loaded from environment variables only
//! (FEDEX_CLIENT_SECRET, UPS_CLIENT_SECRET, DHL_CLIENT_SECRET,
//! ONTRAC_API_KEY), never from the TOML, to avoid leaking them through
//! config files. A carrier section without its secret is a startup
//! error; an absent section simply leaves that carrier unconfigured.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use carriers::{
    CarrierRegistry, DhlTracker, FedexTracker, OauthConfig, OntracConfig, OntracTracker,
    SharedConfig, UpsTracker,
};
use common::Secret;
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fedex: Option<OauthSection>,
    #[serde(default)]
    pub ups: Option<OauthSection>,
    #[serde(default)]
    pub dhl: Option<OauthSection>,
    #[serde(default)]
    pub ontrac: Option<OntracSection>,
}

/// HTTP server and shared tracker settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_refresh_buffer")]
    pub token_refresh_buffer_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
            request_timeout_secs: default_request_timeout(),
            token_refresh_buffer_secs: default_refresh_buffer(),
            max_retries: default_max_retries(),
        }
    }
}

/// An OAuth carrier's section (FedEx, UPS, DHL)
#[derive(Debug, Deserialize)]
pub struct OauthSection {
    pub client_id: String,
    /// Resolved from the carrier's env var, never the TOML
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,
}

/// OnTrac's section (static API key)
#[derive(Debug, Deserialize)]
pub struct OntracSection {
    pub account_number: String,
    /// Resolved from ONTRAC_API_KEY, never the TOML
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().expect("static default address")
}

fn default_max_connections() -> usize {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_refresh_buffer() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_sandbox() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file, then resolve carrier secrets
    /// from environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.server.request_timeout_secs == 0 {
            return Err(common::Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if config.server.max_retries == 0 {
            return Err(common::Error::Config(
                "max_retries must be greater than 0".into(),
            ));
        }

        if let Some(fedex) = &mut config.fedex {
            fedex.client_secret = Some(require_env("FEDEX_CLIENT_SECRET")?);
        }
        if let Some(ups) = &mut config.ups {
            ups.client_secret = Some(require_env("UPS_CLIENT_SECRET")?);
        }
        if let Some(dhl) = &mut config.dhl {
            dhl.client_secret = Some(require_env("DHL_CLIENT_SECRET")?);
        }
        if let Some(ontrac) = &mut config.ontrac {
            ontrac.api_key = Some(require_env("ONTRAC_API_KEY")?);
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(path) = cli_path {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(path);
        }
        PathBuf::from("track-api.toml")
    }

    /// Settings shared by every tracker.
    pub fn shared(&self) -> SharedConfig {
        SharedConfig {
            request_timeout: Duration::from_secs(self.server.request_timeout_secs),
            refresh_buffer: Duration::from_secs(self.server.token_refresh_buffer_secs),
            max_retries: self.server.max_retries,
        }
    }

    /// Build the registry with one tracker per configured carrier.
    pub fn build_registry(&self, client: reqwest::Client) -> CarrierRegistry {
        let shared = self.shared();
        let mut registry = CarrierRegistry::new();

        if let Some(section) = &self.fedex {
            if let Some(config) = oauth_config(section) {
                registry.register(Arc::new(FedexTracker::new(&config, &shared, client.clone())));
            }
        }
        if let Some(section) = &self.ups {
            if let Some(config) = oauth_config(section) {
                registry.register(Arc::new(UpsTracker::new(&config, &shared, client.clone())));
            }
        }
        if let Some(section) = &self.dhl {
            if let Some(config) = oauth_config(section) {
                registry.register(Arc::new(DhlTracker::new(&config, &shared, client.clone())));
            }
        }
        if let Some(section) = &self.ontrac {
            if let Some(api_key) = &section.api_key {
                let config = OntracConfig {
                    api_key: api_key.clone(),
                    account_number: section.account_number.clone(),
                    sandbox: section.sandbox,
                };
                registry.register(Arc::new(OntracTracker::new(&config, &shared, client)));
            }
        }

        registry
    }
}

fn oauth_config(section: &OauthSection) -> Option<OauthConfig> {
    Some(OauthConfig {
        client_id: section.client_id.clone(),
        client_secret: section.client_secret.as_ref()?.clone(),
        sandbox: section.sandbox,
    })
}

fn require_env(name: &str) -> common::Result<Secret<String>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(Secret::new(value)),
        _ => Err(common::Error::MissingCredential(name.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track-api.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let (_dir, path) = write_config("");
        let config = Config::load(&path).unwrap();

        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.server.token_refresh_buffer_secs, 60);
        assert!(config.fedex.is_none());

        let shared = config.shared();
        assert_eq!(shared.request_timeout, Duration::from_secs(30));
        assert_eq!(shared.refresh_buffer, Duration::from_secs(60));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let (_dir, path) = write_config("[server]\nrequest_timeout_secs = 0\n");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn carrier_section_without_secret_env_fails() {
        let (_dir, path) = write_config("[dhl]\nclient_id = \"cid\"\n");
        // DHL_CLIENT_SECRET deliberately not set for this name
        unsafe { std::env::remove_var("DHL_CLIENT_SECRET") };
        let err = Config::load(&path).unwrap_err();
        assert!(
            matches!(err, common::Error::MissingCredential(ref name) if name == "DHL_CLIENT_SECRET"),
            "got: {err:?}"
        );
    }

    #[test]
    fn carrier_section_with_secret_env_builds_tracker() {
        let (_dir, path) = write_config(
            "[ontrac]\naccount_number = \"37\"\nsandbox = true\n",
        );
        unsafe { std::env::set_var("ONTRAC_API_KEY", "test-key") };
        let config = Config::load(&path).unwrap();
        let registry = config.build_registry(reqwest::Client::new());
        assert!(registry.is_configured(tracking_core::Carrier::Ontrac));
        assert!(!registry.is_configured(tracking_core::Carrier::Fedex));
        unsafe { std::env::remove_var("ONTRAC_API_KEY") };
    }

    #[test]
    fn resolve_path_prefers_cli() {
        let path = Config::resolve_path(Some("/etc/track-api.toml"));
        assert_eq!(path, PathBuf::from("/etc/track-api.toml"));
    }

    #[test]
    fn unparseable_toml_is_a_toml_error() {
        let (_dir, path) = write_config("[server\nbroken");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, common::Error::Toml(_)));
    }
}
