//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Workflow engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of lifecycle operations running at once
    pub worker_threads: usize,
    /// Name given to worker threads
    pub thread_name: String,
}

impl EngineConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count
    #[must_use]
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    /// Set the worker thread name
    #[must_use]
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 8,
            thread_name: "cairn-worker".to_string(),
        }
    }
}
