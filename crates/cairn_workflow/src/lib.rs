//! CAIRN Workflow Engine
//!
//! Turns a set of node and relationship instances into a task graph and
//! runs it on a worker pool:
//! - Lifecycle bundles: one task per phase per instance, in fixed order
//! - Dependency wiring: cross-instance edges from hosts, parents, declared
//!   dependencies and relationship endpoints
//! - Execution: submits tasks as their dependencies clear and fails with a
//!   cyclic-dependency error as soon as nothing left can run

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundle;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod graph;
pub mod listener;
pub mod metrics;
mod operation;
pub mod plan;
pub mod pool;
pub mod task;
pub mod wiring;

// Re-exports
pub use bundle::LifecycleBundle;
pub use config::EngineConfig;
pub use engine::WorkflowEngine;
pub use error::{WorkflowError, WorkflowResult};
pub use execution::{ExecutionStatus, WorkflowExecution};
pub use graph::{GraphBuilder, TaskGraph};
pub use listener::ExecutionListener;
pub use metrics::ExecutionMetrics;
pub use plan::{WorkflowKind, WorkflowPlan};
pub use pool::WorkerPool;
pub use task::{Task, TaskId, TaskState};
