//! Validation of topology descriptions before instantiation.

use crate::description::TopologyDescription;
use crate::registry::TypeRegistry;
use cairn_core::CoreError;
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// One problem found in a description
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two nodes or two relationships share a name
    #[error("duplicate {kind} name: {name}")]
    DuplicateName {
        /// `node` or `relationship`
        kind: &'static str,
        /// The name
        name: String,
    },
    /// Type not in the registry
    #[error("{owner} uses unknown {kind} type {type_name}")]
    UnknownType {
        /// `node` or `relationship`
        kind: &'static str,
        /// Node or relationship using the type
        owner: String,
        /// The type name
        type_name: String,
    },
    /// Reference to a node that is not declared
    #[error("{owner}.{field} references unknown node {target}")]
    UnknownReference {
        /// Declaring node or relationship
        owner: String,
        /// `parent`, `host`, `depends_on`, `source` or `target`
        field: &'static str,
        /// Missing node name
        target: String,
    },
    /// Node depending on or hosted by itself
    #[error("{node}.{field} references itself")]
    SelfReference {
        /// The node
        node: String,
        /// Offending field
        field: &'static str,
    },
    /// Instance bounds violate `min <= default <= max` or `max >= 1`
    #[error("{node} has invalid instance bounds min={min} default={default} max={max}")]
    InvalidBounds {
        /// The node
        node: String,
        /// Declared minimum
        min: u32,
        /// Declared default
        default: u32,
        /// Declared maximum
        max: u32,
    },
    /// The parent relation loops
    #[error("parent cycle through {}", nodes.join(" -> "))]
    ParentCycle {
        /// Nodes on the cycle
        nodes: Vec<String>,
    },
}

/// Checks a description against a type registry
pub struct Validator<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> Validator<'a> {
    /// Create a validator resolving types through `registry`
    #[must_use]
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Validate a description, collecting every problem found
    ///
    /// # Errors
    ///
    /// Returns all validation errors if the description is invalid
    pub fn validate(&self, desc: &TopologyDescription) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let mut names = IndexSet::new();
        for node in &desc.nodes {
            if !names.insert(node.name.as_str()) {
                errors.push(ValidationError::DuplicateName {
                    kind: "node",
                    name: node.name.clone(),
                });
            }
        }
        let mut relationship_names = IndexSet::new();
        for rel in &desc.relationships {
            if !relationship_names.insert(rel.name.as_str()) {
                errors.push(ValidationError::DuplicateName {
                    kind: "relationship",
                    name: rel.name.clone(),
                });
            }
        }

        for node in &desc.nodes {
            if self.registry.node_type(&node.type_name).is_err() {
                errors.push(ValidationError::UnknownType {
                    kind: "node",
                    owner: node.name.clone(),
                    type_name: node.type_name.clone(),
                });
            }

            let references = node
                .parent
                .iter()
                .map(|p| ("parent", p))
                .chain(node.host.iter().map(|h| ("host", h)))
                .chain(node.depends_on.iter().map(|d| ("depends_on", d)));
            for (field, target) in references {
                if target == &node.name {
                    errors.push(ValidationError::SelfReference {
                        node: node.name.clone(),
                        field,
                    });
                } else if !names.contains(target.as_str()) {
                    errors.push(ValidationError::UnknownReference {
                        owner: node.name.clone(),
                        field,
                        target: target.clone(),
                    });
                }
            }

            let bounds = node.instances;
            if bounds.max == 0 || bounds.min > bounds.default || bounds.default > bounds.max {
                errors.push(ValidationError::InvalidBounds {
                    node: node.name.clone(),
                    min: bounds.min,
                    default: bounds.default,
                    max: bounds.max,
                });
            }
        }

        for rel in &desc.relationships {
            if self.registry.relationship_type(&rel.type_name).is_err() {
                errors.push(ValidationError::UnknownType {
                    kind: "relationship",
                    owner: rel.name.clone(),
                    type_name: rel.type_name.clone(),
                });
            }
            for (field, target) in [("source", &rel.source), ("target", &rel.target)] {
                if !names.contains(target.as_str()) {
                    errors.push(ValidationError::UnknownReference {
                        owner: rel.name.clone(),
                        field,
                        target: target.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = Self::find_parent_cycle(desc) {
            errors.push(ValidationError::ParentCycle { nodes: cycle });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Follow parent links from every node; a revisit on the current walk is a cycle
    fn find_parent_cycle(desc: &TopologyDescription) -> Option<Vec<String>> {
        let parents: IndexMap<&str, &str> = desc
            .nodes
            .iter()
            .filter_map(|n| {
                n.parent
                    .as_deref()
                    .or(n.host.as_deref())
                    .map(|p| (n.name.as_str(), p))
            })
            .collect();

        for start in parents.keys() {
            let mut walk: IndexSet<&str> = IndexSet::new();
            let mut current = *start;
            while let Some(parent) = parents.get(current) {
                if !walk.insert(current) {
                    let from = walk.get_index_of(current).unwrap_or(0);
                    return Some(walk.iter().skip(from).map(ToString::to_string).collect());
                }
                current = *parent;
            }
        }
        None
    }
}

/// Collapse validation errors into one core error
#[must_use]
pub fn into_core_error(errors: &[ValidationError]) -> CoreError {
    let reason = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    CoreError::validation("topology", reason)
}
