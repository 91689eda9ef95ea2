//! Per-execution counters.

use serde::{Deserialize, Serialize};

/// Execution metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    /// Tasks handed to the worker pool
    pub tasks_submitted: u64,
    /// Tasks completed
    pub tasks_completed: u64,
    /// Tasks failed
    pub tasks_failed: u64,
    /// Tasks that ran as mock stand-ins
    pub tasks_mocked: u64,
    /// Lifecycle operations actually invoked
    pub operations_invoked: u64,
    /// Operations skipped: capability not declared or already configured
    pub operations_skipped: u64,
}

impl ExecutionMetrics {
    /// Create new metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a task submission
    pub fn record_submission(&mut self) {
        self.tasks_submitted += 1;
    }

    /// Record a task completion
    pub fn record_completion(&mut self) {
        self.tasks_completed += 1;
    }

    /// Record a task failure
    pub fn record_failure(&mut self) {
        self.tasks_failed += 1;
    }

    /// Record a mock task
    pub fn record_mock(&mut self) {
        self.tasks_mocked += 1;
    }

    /// Record operations invoked and skipped by one task
    pub fn record_operations(&mut self, invoked: u64, skipped: u64) {
        self.operations_invoked += invoked;
        self.operations_skipped += skipped;
    }

    /// Tasks submitted but not yet done
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.tasks_submitted
            .saturating_sub(self.tasks_completed + self.tasks_failed)
    }

    /// Get success rate (0.0 - 1.0)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let done = self.tasks_completed + self.tasks_failed;
        if done == 0 {
            return 1.0;
        }
        self.tasks_completed as f64 / done as f64
    }
}
