//! Workflow errors.

use cairn_core::{CoreError, ExecutionId, Phase};
use cairn_topology::OperationError;
use std::sync::Arc;
use thiserror::Error;

/// Workflow result type
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Workflow error type
///
/// Cloneable so the terminal error of an execution can be handed to every
/// waiter and listener.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// No remaining task can ever run
    #[error("execution {execution} is stuck with {remaining} tasks left, none runnable:\n{dump}")]
    CyclicDependency {
        /// The execution
        execution: ExecutionId,
        /// Number of tasks that never completed
        remaining: usize,
        /// Remaining tasks and their unmet dependencies
        dump: String,
    },

    /// A lifecycle operation returned an error
    #[error("{phase} failed on {instance}: {source}")]
    OperationFailed {
        /// Instance the task was bound to
        instance: String,
        /// Phase of the task
        phase: Phase,
        /// The driver error
        #[source]
        source: Arc<OperationError>,
    },

    /// A lifecycle operation panicked
    #[error("{phase} panicked on {instance}: {message}")]
    Panicked {
        /// Instance the task was bound to
        instance: String,
        /// Phase of the task
        phase: Phase,
        /// Panic payload, when it was a string
        message: String,
    },

    /// The execution was cancelled before finishing
    #[error("execution {0} was cancelled")]
    Cancelled(ExecutionId),

    /// The execution was stopped before finishing
    #[error("execution {0} was stopped")]
    Stopped(ExecutionId),

    /// Lookup in the topology failed while planning
    #[error(transparent)]
    Topology(#[from] CoreError),

    /// The worker pool could not be built
    #[error("worker pool: {0}")]
    Pool(String),
}

impl WorkflowError {
    /// Check if this is a cyclic-dependency failure
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        matches!(self, Self::CyclicDependency { .. })
    }
}
