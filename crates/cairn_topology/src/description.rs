//! JSON description a topology is instantiated from.
//!
//! ```json
//! {
//!   "name": "petclinic",
//!   "nodes": [
//!     {
//!       "name": "WebServer",
//!       "type": "Compute",
//!       "instances": { "min": 1, "max": 3, "default": 2 }
//!     },
//!     { "name": "Java", "type": "Software", "host": "WebServer" }
//!   ],
//!   "relationships": [
//!     { "name": "java_hosted_on", "type": "HostedOn", "source": "Java", "target": "WebServer" }
//!   ]
//! }
//! ```

use cairn_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Instance count bounds of a scaling group, per parent instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceBounds {
    /// Minimum count
    pub min: u32,
    /// Maximum count
    pub max: u32,
    /// Count generated at initialization
    pub default: u32,
}

impl InstanceBounds {
    /// Create bounds
    #[must_use]
    pub const fn new(min: u32, max: u32, default: u32) -> Self {
        Self { min, max, default }
    }

    /// Check if a count is within `[min, max]`
    #[must_use]
    pub const fn contains(&self, count: u32) -> bool {
        count >= self.min && count <= self.max
    }
}

impl Default for InstanceBounds {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

/// One scaling group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Node name, unique in the topology
    pub name: String,
    /// Registered node type
    #[serde(rename = "type")]
    pub type_name: String,
    /// Structural parent node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Host node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Declared dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Instance count bounds
    #[serde(default)]
    pub instances: InstanceBounds,
}

impl NodeDescription {
    /// Create a single-instance node
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            parent: None,
            host: None,
            depends_on: Vec::new(),
            instances: InstanceBounds::default(),
        }
    }

    /// Set the parent node
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the host node
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Add a declared dependency
    #[must_use]
    pub fn with_dependency(mut self, node: impl Into<String>) -> Self {
        self.depends_on.push(node.into());
        self
    }

    /// Set the instance bounds
    #[must_use]
    pub fn with_instances(mut self, min: u32, max: u32, default: u32) -> Self {
        self.instances = InstanceBounds::new(min, max, default);
        self
    }
}

/// One relationship node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDescription {
    /// Relationship name, unique in the topology
    pub name: String,
    /// Registered relationship type
    #[serde(rename = "type")]
    pub type_name: String,
    /// Source node
    pub source: String,
    /// Target node
    pub target: String,
    /// Overrides the type's many-to-many default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub many_to_many: Option<bool>,
}

impl RelationshipDescription {
    /// Create a relationship node
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            source: source.into(),
            target: target.into(),
            many_to_many: None,
        }
    }

    /// Override the many-to-many flag
    #[must_use]
    pub fn with_many_to_many(mut self, many_to_many: bool) -> Self {
        self.many_to_many = Some(many_to_many);
        self
    }
}

/// A whole topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDescription {
    /// Topology name
    pub name: String,
    /// Scaling groups
    pub nodes: Vec<NodeDescription>,
    /// Relationship nodes
    #[serde(default)]
    pub relationships: Vec<RelationshipDescription>,
}

impl TopologyDescription {
    /// Create an empty description
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Add a node
    #[must_use]
    pub fn with_node(mut self, node: NodeDescription) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a relationship
    #[must_use]
    pub fn with_relationship(mut self, relationship: RelationshipDescription) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Look up a node by name
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeDescription> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Parse from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the document is not a valid description
    pub fn from_json(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::validation("description", e.to_string()))
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::validation("description", e.to_string()))
    }
}
