//! Error types for velador-core.
//!
//! Mutating operations (`install`, `uninstall`, `stop`, `restart`) return
//! [`ServiceError`]. Read-only queries never return errors: failures are
//! folded into `None` or [`crate::RuntimeStatus::unknown`].

use std::path::PathBuf;

/// Result type alias for service lifecycle operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Result type alias for external tool invocations.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Failure of an external supervisor tool (`launchctl`, `systemctl`,
/// `schtasks`, `sv`, ...).
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The executable is not installed or not on `PATH`.
    #[error("{program} not found: {source}")]
    Missing {
        /// Program that was invoked.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The executable exists but could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("{command} exited with {}: {message}", display_code(.code))]
    Failed {
        /// Full command line, for diagnostics.
        command: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// The tool's own diagnostic text (stderr, or stdout when stderr is empty).
        message: String,
    },
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"))
}

impl ToolError {
    /// Creates a failed-command error.
    #[must_use]
    pub fn failed(command: impl Into<String>, code: Option<i32>, message: impl Into<String>) -> Self {
        Self::Failed {
            command: command.into(),
            code,
            message: message.into(),
        }
    }

    /// Returns true if the tool itself is missing.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }

    /// Returns the tool's diagnostic text, or the spawn error text.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Failed { message, .. } => message.clone(),
            Self::Missing { source, .. } | Self::Spawn { source, .. } => source.to_string(),
        }
    }
}

fn disable_word(disabled: &bool) -> &'static str {
    if *disabled { "succeeded" } else { "failed" }
}

/// Underlying cause of an install failure.
#[derive(Debug, thiserror::Error)]
pub enum InstallCause {
    /// Writing the artifact failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Registering the artifact with the supervisor failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Comprehensive error type for service lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Artifact write or enable step failed during install.
    #[error("{step} failed: {message}")]
    Install {
        /// Action label (e.g. `sv-enable`, `write unit file`).
        step: String,
        /// Verbatim diagnostic text of the failing step.
        message: String,
        /// Original cause.
        #[source]
        source: InstallCause,
    },

    /// Artifact removal failed during uninstall.
    #[error("failed to remove {}: {source} (supervisor disable {})", .path.display(), disable_word(.disabled))]
    Uninstall {
        /// Artifact that could not be removed.
        path: PathBuf,
        /// Whether the disable step before removal succeeded.
        disabled: bool,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Supervisor command failed on `stop`/`restart`.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// No backend exists for the host OS.
    #[error("gateway service install not supported on {0}")]
    UnsupportedPlatform(String),

    /// The install request is malformed.
    #[error("invalid install spec: {0}")]
    InvalidSpec(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Creates an install error from a failed step, preserving the cause.
    #[must_use]
    pub fn install(step: impl Into<String>, cause: impl Into<InstallCause>) -> Self {
        let source = cause.into();
        let message = match &source {
            InstallCause::Io(e) => e.to_string(),
            InstallCause::Tool(e) => e.to_string(),
        };
        Self::Install {
            step: step.into(),
            message,
            source,
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an invalid-spec error.
    #[must_use]
    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }

    /// Returns true if this is an install failure.
    #[must_use]
    pub const fn is_install(&self) -> bool {
        matches!(self, Self::Install { .. })
    }

    /// Returns true if the failure was caused by a missing supervisor tool.
    #[must_use]
    pub fn is_tool_missing(&self) -> bool {
        match self {
            Self::Tool(e)
            | Self::Install {
                source: InstallCause::Tool(e),
                ..
            } => e.is_missing(),
            _ => false,
        }
    }
}
