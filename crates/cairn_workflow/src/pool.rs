//! Worker pool running blocking lifecycle operations.
//!
//! Tasks are blocking units of work (SSH sessions, cloud API calls), so they
//! go to Tokio's blocking pool. The pool either owns a runtime or borrows the
//! handle of a runtime the caller already runs.

use crate::config::EngineConfig;
use crate::error::{WorkflowError, WorkflowResult};
use tokio::runtime::{Builder, Handle, Runtime};

/// Shared worker pool
pub struct WorkerPool {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl WorkerPool {
    /// Build a pool with its own runtime
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be started
    pub fn new(config: &EngineConfig) -> WorkflowResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads.max(1))
            .thread_name(config.thread_name.clone())
            .build()
            .map_err(|e| WorkflowError::Pool(e.to_string()))?;
        let handle = runtime.handle().clone();
        Ok(Self {
            runtime: Some(runtime),
            handle,
        })
    }

    /// Use the runtime behind an existing handle
    #[must_use]
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            runtime: None,
            handle,
        }
    }

    /// Handle tasks are spawned on
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Whether the pool owns its runtime
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.runtime.is_some()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("owned", &self.is_owned())
            .finish()
    }
}
