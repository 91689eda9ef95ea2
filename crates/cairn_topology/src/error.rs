//! Errors raised by lifecycle operations.

use std::error::Error as StdError;
use thiserror::Error;

/// Result of a lifecycle operation
pub type OperationResult<T> = Result<T, OperationError>;

/// Failure of a node or relationship lifecycle operation
///
/// Drivers wrap whatever went wrong (a cloud API error, a failed script, a
/// lost SSH connection) into this type. The workflow engine never inspects
/// the cause, it only records and reports it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct OperationError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl OperationError {
    /// Create an error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The error message, without the cause chain
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for OperationError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source("i/o failure", err)
    }
}
