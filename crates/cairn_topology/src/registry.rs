//! Type registry mapping type names to lifecycle constructors.
//!
//! Each entry carries a closed kind tag, the capability set the type
//! implements and a constructor producing a fresh lifecycle object for every
//! new instance.

use crate::lifecycle::{NodeLifecycle, RelationshipLifecycle};
use cairn_core::{CapabilitySet, CoreError, CoreResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Constructor for node lifecycles
pub type NodeConstructor = Arc<dyn Fn() -> Arc<dyn NodeLifecycle> + Send + Sync>;

/// Constructor for relationship lifecycles
pub type RelationshipConstructor = Arc<dyn Fn() -> Arc<dyn RelationshipLifecycle> + Send + Sync>;

/// Kind of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual machine, container, bare metal host
    Compute,
    /// Network or subnet
    Network,
    /// Block storage, volume
    Storage,
    /// Software component installed on a compute node
    Software,
}

/// Kind of a relationship type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// Source runs on target
    HostedOn,
    /// Source (storage) is attached to target
    AttachedTo,
    /// Source is connected to a target network
    Network,
    /// Plain ordering dependency
    DependsOn,
}

/// Registered node type
#[derive(Clone)]
pub struct NodeTypeEntry {
    /// Type name
    pub name: String,
    /// Type kind
    pub kind: NodeKind,
    /// Implemented operations
    pub capabilities: CapabilitySet,
    constructor: NodeConstructor,
}

impl NodeTypeEntry {
    /// Create a new entry
    pub fn new<F>(name: impl Into<String>, kind: NodeKind, constructor: F) -> Self
    where
        F: Fn() -> Arc<dyn NodeLifecycle> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            capabilities: CapabilitySet::full_node(),
            constructor: Arc::new(constructor),
        }
    }

    /// Replace the capability set
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Build a fresh lifecycle object
    #[must_use]
    pub fn construct(&self) -> Arc<dyn NodeLifecycle> {
        (self.constructor)()
    }
}

impl std::fmt::Debug for NodeTypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTypeEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Registered relationship type
#[derive(Clone)]
pub struct RelationshipTypeEntry {
    /// Type name
    pub name: String,
    /// Type kind
    pub kind: RelationshipKind,
    /// Implemented operations
    pub capabilities: CapabilitySet,
    /// Whether instances fan out across sibling scaling branches by default
    pub many_to_many: bool,
    constructor: RelationshipConstructor,
}

impl RelationshipTypeEntry {
    /// Create a new entry
    pub fn new<F>(name: impl Into<String>, kind: RelationshipKind, constructor: F) -> Self
    where
        F: Fn() -> Arc<dyn RelationshipLifecycle> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            capabilities: CapabilitySet::full_relationship(),
            many_to_many: false,
            constructor: Arc::new(constructor),
        }
    }

    /// Replace the capability set
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Mark the type as many-to-many
    #[must_use]
    pub fn with_many_to_many(mut self, many_to_many: bool) -> Self {
        self.many_to_many = many_to_many;
        self
    }

    /// Build a fresh lifecycle object
    #[must_use]
    pub fn construct(&self) -> Arc<dyn RelationshipLifecycle> {
        (self.constructor)()
    }
}

impl std::fmt::Debug for RelationshipTypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipTypeEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("many_to_many", &self.many_to_many)
            .finish_non_exhaustive()
    }
}

/// Registry of node and relationship types
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    nodes: IndexMap<String, NodeTypeEntry>,
    relationships: IndexMap<String, RelationshipTypeEntry>,
}

impl TypeRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            relationships: IndexMap::new(),
        }
    }

    /// Register a node type
    ///
    /// # Errors
    ///
    /// Returns error if a node type with the same name is registered
    pub fn register_node(&mut self, entry: NodeTypeEntry) -> CoreResult<()> {
        if self.nodes.contains_key(&entry.name) {
            return Err(CoreError::already_exists("node type", &entry.name));
        }
        self.nodes.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Register a relationship type
    ///
    /// # Errors
    ///
    /// Returns error if a relationship type with the same name is registered
    pub fn register_relationship(&mut self, entry: RelationshipTypeEntry) -> CoreResult<()> {
        if self.relationships.contains_key(&entry.name) {
            return Err(CoreError::already_exists("relationship type", &entry.name));
        }
        self.relationships.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Add or replace a node type
    #[must_use]
    pub fn with_node(mut self, entry: NodeTypeEntry) -> Self {
        self.nodes.insert(entry.name.clone(), entry);
        self
    }

    /// Add or replace a relationship type
    #[must_use]
    pub fn with_relationship(mut self, entry: RelationshipTypeEntry) -> Self {
        self.relationships.insert(entry.name.clone(), entry);
        self
    }

    /// Look up a node type
    ///
    /// # Errors
    ///
    /// Returns error if the type is not registered
    pub fn node_type(&self, name: &str) -> CoreResult<&NodeTypeEntry> {
        self.nodes.get(name).ok_or_else(|| CoreError::UnknownType {
            kind: "node".to_string(),
            name: name.to_string(),
        })
    }

    /// Look up a relationship type
    ///
    /// # Errors
    ///
    /// Returns error if the type is not registered
    pub fn relationship_type(&self, name: &str) -> CoreResult<&RelationshipTypeEntry> {
        self.relationships
            .get(name)
            .ok_or_else(|| CoreError::UnknownType {
                kind: "relationship".to_string(),
                name: name.to_string(),
            })
    }

    /// Registered node type names, in registration order
    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Registered relationship type names, in registration order
    pub fn relationship_types(&self) -> impl Iterator<Item = &str> {
        self.relationships.keys().map(String::as_str)
    }
}
