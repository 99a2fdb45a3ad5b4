//! Error types for the Spotify domain.

use thiserror::Error;

/// Result alias for calls against the remote Web API.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A failure reported by the remote Web API (or by decoding its response).
///
/// The message is free text. Failure classification works on this text only,
/// so the HTTP status is carried for logging and never inspected by policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    message: String,
    status: Option<u16>,
}

impl ApiError {
    /// Create an error from a bare message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Create an error carrying the HTTP status that produced it.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }

    /// The raw error text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status code, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::with_status(status.as_u16(), err.to_string()),
            None => Self::new(err.to_string()),
        }
    }
}

/// Errors raised by the Spotify domain.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// Client identity is missing or unusable.
    #[error("{0}")]
    Configuration(String),

    /// The remote API failed with an unclassified error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The OAuth authorization flow failed.
    #[error("Authorization failed: {0}")]
    Auth(String),

    /// Credential file I/O failed.
    #[error("Credential file error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential file could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Talking to the accounts service failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SpotifyError {
    /// Create a new configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new authorization error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Whether this error means the client identity is not configured.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
