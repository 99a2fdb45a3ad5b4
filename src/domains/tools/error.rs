//! Tool-specific error types.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use thiserror::Error;
use tracing::{error, warn};

use crate::domains::spotify::SpotifyError;

use super::definitions::common::text_result;

/// Errors that can occur during tool operations.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid arguments were provided to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The Spotify layer failed with an error that was not classified.
    #[error(transparent)]
    Spotify(#[from] SpotifyError),
}

impl ToolError {
    /// Create a new "invalid arguments" error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a new "execution failed" error.
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Convert into what the tool call returns.
    ///
    /// Missing credentials become guidance text pointing at the configure
    /// action. Everything else is surfaced as a protocol-level error.
    pub fn into_call_result(self) -> Result<CallToolResult, McpError> {
        match self {
            Self::Spotify(e) if e.is_configuration() => {
                warn!("Spotify is not configured: {}", e);
                Ok(text_result(format!("⚙️ {}", e)))
            }
            Self::InvalidArguments(msg) => Err(McpError::invalid_params(msg, None)),
            other => {
                error!("Tool execution failed: {}", other);
                Err(McpError::internal_error(other.to_string(), None))
            }
        }
    }
}
