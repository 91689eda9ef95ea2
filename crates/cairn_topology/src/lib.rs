//! CAIRN Topology
//!
//! The in-memory model of a deployment: scaling groups (deployment nodes and
//! relationship nodes), the live node and relationship instances generated
//! from them, the type registry that maps type names to lifecycle
//! implementations, and the JSON description a topology is built from.
//!
//! Instances are stored in an arena keyed by id. Every cross reference
//! (parent, host, relationship endpoints) is an id, never an owning pointer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod description;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod node;
pub mod registry;
pub mod topology;
pub mod validate;

// Re-exports
pub use description::{
    InstanceBounds, NodeDescription, RelationshipDescription, TopologyDescription,
};
pub use error::{OperationError, OperationResult};
pub use instance::{Attributes, NodeInstance, RelationshipInstance};
pub use lifecycle::{
    NodeContext, NodeLifecycle, NoopLifecycle, RelationshipContext, RelationshipLifecycle,
};
pub use node::{DeploymentNode, DeploymentRelationshipNode};
pub use registry::{NodeKind, NodeTypeEntry, RelationshipKind, RelationshipTypeEntry, TypeRegistry};
pub use topology::{InstanceSnapshot, RelationshipSnapshot, Topology, TopologySnapshot};
pub use validate::{ValidationError, Validator};
