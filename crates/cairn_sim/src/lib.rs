//! CAIRN Simulated Drivers
//!
//! Lifecycle drivers that sleep for a seeded latency, record every operation
//! in a shared journal and fail or panic on scripted phases. Used by tests
//! and by the `cairn` binary in place of real infrastructure.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod driver;
pub mod failure;
pub mod harness;
pub mod journal;
pub mod seed;

// Re-exports
pub use driver::{SimBackend, SimNode, SimRelationship};
pub use failure::{FailureKind, FailurePlan, FailureRule, FailureTarget, ParseRuleError};
pub use harness::SimEnvironment;
pub use journal::{Journal, JournalEntry, JournalOutcome};
pub use seed::{LatencyModel, SimSeed};
