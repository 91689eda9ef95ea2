//! Deployment errors.

use cairn_core::{CoreError, ExecutionId};
use cairn_workflow::WorkflowError;
use std::time::Duration;
use thiserror::Error;

/// Deployment result type
pub type DeployResult<T> = Result<T, DeployError>;

/// Deployment error type
#[derive(Debug, Error)]
pub enum DeployError {
    /// Topology lookup or instantiation failed
    #[error(transparent)]
    Topology(#[from] CoreError),

    /// A workflow execution failed, was stopped or was cancelled
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Requested instance count outside the node's bounds
    #[error("cannot scale {node} to {requested}: allowed range is [{min}, {max}]")]
    ScaleOutOfBounds {
        /// Node being scaled
        node: String,
        /// Requested count per parent instance
        requested: u32,
        /// Lower bound
        min: u32,
        /// Upper bound
        max: u32,
    },

    /// An execution did not finish in time; it keeps running
    #[error("execution {execution} did not finish within {timeout:?}")]
    Timeout {
        /// The execution still running
        execution: ExecutionId,
        /// How long we waited
        timeout: Duration,
    },

    /// Invalid configuration file
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// The workflow error behind this error, if any
    #[must_use]
    pub fn as_workflow(&self) -> Option<&WorkflowError> {
        match self {
            Self::Workflow(err) => Some(err),
            _ => None,
        }
    }
}
