//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret is loaded from the X_CLIENT_SECRET env var or
//! client_secret_file, never stored in the TOML directly to avoid leaking
//! secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use xpost_store::HeaderMode;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub oauth: OAuthSection,
    pub store: StoreSection,
    pub server: ServerSection,
}

/// OAuth application settings
#[derive(Debug, Deserialize)]
pub struct OAuthSection {
    /// Public OAuth client id; X_CLIENT_ID env var takes precedence
    #[serde(default)]
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to X_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// This service's externally visible callback URL, registered with the
    /// platform as the redirect URI
    pub public_url: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: String,
}

/// Workbook store settings
#[derive(Debug, Deserialize)]
pub struct StoreSection {
    pub workbook_path: PathBuf,
    /// Content header policy: keyword | first-row | none
    #[serde(default)]
    pub header_mode: HeaderMode,
    #[serde(default = "default_channel")]
    pub default_channel: String,
}

/// HTTP server settings
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_authorize_url() -> String {
    xpost_auth::DEFAULT_AUTHORIZE_URL.to_string()
}

fn default_api_url() -> String {
    xpost_auth::DEFAULT_API_URL.to_string()
}

fn default_scopes() -> String {
    xpost_auth::DEFAULT_SCOPES.to_string()
}

fn default_channel() -> String {
    "posts".to_string()
}

fn default_max_connections() -> usize {
    64
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client id: X_CLIENT_ID env var overrides the file value.
    /// Client secret resolution order:
    /// 1. X_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    ///
    /// Both the client id and the secret are required; without them no
    /// authorization or refresh call can be made.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(id) = std::env::var("X_CLIENT_ID") {
            config.oauth.client_id = id;
        }
        if config.oauth.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "client_id is not set (config [oauth] or X_CLIENT_ID env var)".into(),
            ));
        }

        // Validate public_url is a valid URL with http(s) scheme
        if !config.oauth.public_url.starts_with("http://")
            && !config.oauth.public_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "public_url must start with http:// or https://, got: {}",
                config.oauth.public_url
            )));
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("X_CLIENT_SECRET") {
            config.oauth.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oauth.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oauth.client_secret = Some(Secret::new(secret));
            }
        }
        if config.oauth.client_secret.is_none() {
            return Err(common::Error::Config(
                "client secret is not set (X_CLIENT_SECRET env var or client_secret_file)".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("x-autopost.toml")
    }
}
