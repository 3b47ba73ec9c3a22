//! Error types for velador-test.

use std::time::Duration;

use thiserror::Error;
use velador_core::ServiceError;

/// Result type alias for test operations.
pub type Result<T> = std::result::Result<T, TestError>;

/// Test infrastructure errors.
#[derive(Debug, Error)]
pub enum TestError {
    /// Harness setup error.
    #[error("harness error: {0}")]
    Harness(String),

    /// Assertion failed.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Operation did not finish in time.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Service operation failed.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TestError {
    /// Creates a harness error.
    #[must_use]
    pub fn harness(msg: impl Into<String>) -> Self {
        Self::Harness(msg.into())
    }

    /// Creates an assertion error.
    #[must_use]
    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::Assertion(msg.into())
    }
}
