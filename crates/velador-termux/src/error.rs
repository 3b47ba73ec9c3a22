//! Error types for Termux device access.

use thiserror::Error;
use velador_core::ToolError;

/// Result type alias for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors from Termux:API wrappers.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The Termux:API binary failed to run or exited non-zero.
    #[error("termux-api error: {0}")]
    Tool(#[from] ToolError),

    /// The binary printed something that is not the expected JSON.
    #[error("invalid JSON from {command}: {source}")]
    Json {
        /// Command line that produced the output.
        command: String,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// The request cannot be turned into a command line.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Reading a produced file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Returns true if the Termux:API binary is not installed.
    #[must_use]
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, Self::Tool(err) if err.is_missing())
    }
}
