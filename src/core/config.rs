//! Configuration management for the MCP server.
//!
//! This module provides a centralized configuration structure populated from
//! environment variables (optionally via a `.env` file) or defaults.

use super::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Redirect URI used when neither the credential file nor the environment sets one.
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8000/callback";

/// File name of the credential record inside the home directory.
pub const CREDENTIALS_FILE_NAME: &str = ".spotify-mcp-tokens.json";

/// Main configuration structure for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Spotify client identity and credential storage.
    pub spotify: SpotifyConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

/// Spotify settings.
///
/// The identity fields here are only the environment fallback: values stored in
/// the credential file take priority when present.
#[derive(Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    /// Location of the persisted credential record.
    pub credentials_path: PathBuf,

    /// `SPOTIFY_CLIENT_ID` from the environment.
    pub client_id: Option<String>,

    /// `SPOTIFY_CLIENT_SECRET` from the environment.
    pub client_secret: Option<String>,

    /// `SPOTIFY_REDIRECT_URI` from the environment.
    pub redirect_uri: Option<String>,

    /// How long the interactive OAuth flow waits for the browser callback.
    pub auth_timeout_secs: u64,
}

/// Custom Debug implementation to redact secrets from logs.
impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("credentials_path", &self.credentials_path)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_timeout_secs", &self.auth_timeout_secs)
            .finish()
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            auth_timeout_secs: 120,
        }
    }
}

fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CREDENTIALS_FILE_NAME)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "spotify-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            transport: TransportConfig::default(),
            spotify: SpotifyConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Server settings use the `MCP_` prefix (`MCP_SERVER_NAME`, `MCP_LOG_LEVEL`,
    /// `MCP_TRANSPORT`). Spotify settings use `SPOTIFY_CLIENT_ID`,
    /// `SPOTIFY_CLIENT_SECRET`, `SPOTIFY_REDIRECT_URI`,
    /// `SPOTIFY_MCP_CREDENTIALS_PATH` and `SPOTIFY_MCP_AUTH_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.transport = TransportConfig::from_env();
        config.spotify = SpotifyConfig::from_env();

        config
    }
}

impl SpotifyConfig {
    /// Load Spotify settings from environment variables.
    pub fn from_env() -> Self {
        let mut spotify = Self::default();

        if let Ok(path) = std::env::var("SPOTIFY_MCP_CREDENTIALS_PATH") {
            spotify.credentials_path = PathBuf::from(path);
        }
        info!("Credential file: {:?}", spotify.credentials_path);

        spotify.client_id = non_empty_var("SPOTIFY_CLIENT_ID");
        spotify.client_secret = non_empty_var("SPOTIFY_CLIENT_SECRET");
        spotify.redirect_uri = non_empty_var("SPOTIFY_REDIRECT_URI");

        if spotify.client_id.is_none() || spotify.client_secret.is_none() {
            warn!(
                "SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET not set - credentials must come \
                 from the credential file (spotifyAuth accion=\"configurar\")"
            );
        }

        if let Ok(timeout) = std::env::var("SPOTIFY_MCP_AUTH_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(secs) => spotify.auth_timeout_secs = secs,
                Err(_) => warn!("Ignoring invalid SPOTIFY_MCP_AUTH_TIMEOUT_SECS: {}", timeout),
            }
        }

        spotify
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
