//! Scaling groups: the "class" every instance is generated from.

use crate::description::{InstanceBounds, NodeDescription, RelationshipDescription};
use crate::registry::{NodeTypeEntry, RelationshipTypeEntry};
use cairn_core::{InstanceId, RelationshipId};
use indexmap::IndexSet;

/// A node scaling group
#[derive(Debug, Clone)]
pub struct DeploymentNode {
    /// Node name
    pub name: String,
    /// Resolved type
    pub node_type: NodeTypeEntry,
    /// Structural parent node, the host when no parent is declared
    pub parent: Option<String>,
    /// Host node
    pub host: Option<String>,
    /// Declared dependencies
    pub depends_on: Vec<String>,
    /// Instance count bounds, per parent instance
    pub bounds: InstanceBounds,
    instances: IndexSet<InstanceId>,
    last_index: u32,
}

impl DeploymentNode {
    /// Create an empty scaling group
    #[must_use]
    pub fn new(desc: &NodeDescription, node_type: NodeTypeEntry) -> Self {
        Self {
            name: desc.name.clone(),
            node_type,
            parent: desc.parent.clone().or_else(|| desc.host.clone()),
            host: desc.host.clone(),
            depends_on: desc.depends_on.clone(),
            bounds: desc.instances,
            instances: IndexSet::new(),
            last_index: 0,
        }
    }

    /// Live instances, in creation order
    #[must_use]
    pub fn instances(&self) -> &IndexSet<InstanceId> {
        &self.instances
    }

    /// Reserve the next instance index
    ///
    /// Indexes are never reused, so a name removed by scale-down never
    /// comes back for a different instance.
    pub fn allocate_index(&mut self) -> u32 {
        self.last_index += 1;
        self.last_index
    }

    /// Track a new live instance
    pub fn add_instance(&mut self, id: InstanceId) {
        self.instances.insert(id);
    }

    /// Forget a removed instance
    pub fn remove_instance(&mut self, id: InstanceId) -> bool {
        self.instances.shift_remove(&id)
    }
}

/// A relationship scaling group
#[derive(Debug, Clone)]
pub struct DeploymentRelationshipNode {
    /// Relationship name
    pub name: String,
    /// Resolved type
    pub relationship_type: RelationshipTypeEntry,
    /// Source node
    pub source: String,
    /// Target node
    pub target: String,
    /// Whether instances fan out across sibling scaling branches
    pub many_to_many: bool,
    instances: IndexSet<RelationshipId>,
}

impl DeploymentRelationshipNode {
    /// Create an empty relationship group
    #[must_use]
    pub fn new(desc: &RelationshipDescription, relationship_type: RelationshipTypeEntry) -> Self {
        Self {
            name: desc.name.clone(),
            many_to_many: desc.many_to_many.unwrap_or(relationship_type.many_to_many),
            relationship_type,
            source: desc.source.clone(),
            target: desc.target.clone(),
            instances: IndexSet::new(),
        }
    }

    /// Live relationship instances
    #[must_use]
    pub fn instances(&self) -> &IndexSet<RelationshipId> {
        &self.instances
    }

    /// Track a new live relationship instance
    pub fn add_instance(&mut self, id: RelationshipId) {
        self.instances.insert(id);
    }

    /// Forget a removed relationship instance
    pub fn remove_instance(&mut self, id: RelationshipId) -> bool {
        self.instances.shift_remove(&id)
    }
}
