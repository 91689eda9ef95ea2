//! CAIRN Core Types
//!
//! Pure types shared by every CAIRN crate: identifiers, lifecycle phases,
//! capability sets and the core error. No I/O happens here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capability;
pub mod error;
pub mod id;
pub mod phase;

// Re-exports
pub use capability::{Capability, CapabilitySet};
pub use error::{CoreError, CoreResult};
pub use id::{ExecutionId, InstanceId, RelationshipId};
pub use phase::{Endpoint, Phase};
