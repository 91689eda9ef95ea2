//! Execution listeners.
//!
//! Listeners are how the outside world (a persister, a topology pruner)
//! learns that an execution reached a terminal state. Each listener is
//! called exactly once, outside the execution lock, before blocked waiters
//! are released.

use crate::error::WorkflowError;
use cairn_core::ExecutionId;

/// Receives the terminal event of an execution
#[allow(unused_variables)]
pub trait ExecutionListener: Send + Sync {
    /// Every task completed
    fn on_finish(&self, execution: ExecutionId) {}

    /// A task failed or the graph got stuck
    fn on_failure(&self, execution: ExecutionId, errors: &[WorkflowError]) {}

    /// The execution was stopped
    fn on_stop(&self, execution: ExecutionId) {}

    /// The execution was cancelled
    fn on_cancel(&self, execution: ExecutionId) {}
}
