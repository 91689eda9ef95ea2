//! Simulation environment wiring drivers into a type registry.

use crate::driver::{SimBackend, SimNode, SimRelationship};
use crate::failure::FailurePlan;
use crate::journal::Journal;
use crate::seed::{LatencyModel, SimSeed};
use cairn_topology::{
    NodeKind, NodeTypeEntry, RelationshipKind, RelationshipTypeEntry, TypeRegistry,
};
use std::sync::Arc;
use std::time::Duration;

/// Node type names and kinds provided by the simulation
pub const NODE_TYPES: [(&str, NodeKind); 4] = [
    ("Compute", NodeKind::Compute),
    ("Network", NodeKind::Network),
    ("Storage", NodeKind::Storage),
    ("Software", NodeKind::Software),
];

/// Relationship type names and kinds provided by the simulation
pub const RELATIONSHIP_TYPES: [(&str, RelationshipKind); 5] = [
    ("HostedOn", RelationshipKind::HostedOn),
    ("AttachedTo", RelationshipKind::AttachedTo),
    ("ConnectedTo", RelationshipKind::Network),
    ("DependsOn", RelationshipKind::DependsOn),
    ("ConnectsTo", RelationshipKind::DependsOn),
];

/// A simulated infrastructure: seed, latency, failure plan and journal
#[derive(Debug, Clone)]
pub struct SimEnvironment {
    seed: SimSeed,
    latency: LatencyModel,
    journal: Journal,
    failures: FailurePlan,
}

impl SimEnvironment {
    /// Create an environment with no latency and no failures
    #[must_use]
    pub fn new() -> Self {
        Self {
            seed: SimSeed::default(),
            latency: LatencyModel::default(),
            journal: Journal::new(),
            failures: FailurePlan::new(),
        }
    }

    /// Set the seed for latency jitter and generated attributes
    #[must_use]
    pub fn with_seed(mut self, seed: SimSeed) -> Self {
        self.seed = seed;
        self
    }

    /// Set per-operation latency
    #[must_use]
    pub fn with_latency(mut self, base: Duration, jitter: Duration) -> Self {
        self.latency = LatencyModel::new(base, jitter);
        self
    }

    /// Seed in use
    #[must_use]
    pub fn seed(&self) -> &SimSeed {
        &self.seed
    }

    /// Latency in use
    #[must_use]
    pub fn latency(&self) -> LatencyModel {
        self.latency
    }

    /// Shared operation journal
    #[must_use]
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Shared failure plan; rules added later apply to running drivers
    #[must_use]
    pub fn failures(&self) -> FailurePlan {
        self.failures.clone()
    }

    /// Registry with every simulated type bound to this environment
    #[must_use]
    pub fn registry(&self) -> TypeRegistry {
        let backend = Arc::new(SimBackend::new(
            self.journal.clone(),
            self.failures.clone(),
            self.latency,
            &self.seed.derive("drivers"),
        ));

        let registry = NODE_TYPES.into_iter().fold(TypeRegistry::new(), |registry, (name, kind)| {
            let backend = Arc::clone(&backend);
            registry.with_node(NodeTypeEntry::new(name, kind, move || {
                Arc::new(SimNode::new(Arc::clone(&backend), kind))
            }))
        });

        RELATIONSHIP_TYPES.into_iter().fold(registry, |registry, (name, kind)| {
            let backend = Arc::clone(&backend);
            registry.with_relationship(RelationshipTypeEntry::new(name, kind, move || {
                Arc::new(SimRelationship::new(Arc::clone(&backend), kind))
            }))
        })
    }
}

impl Default for SimEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
