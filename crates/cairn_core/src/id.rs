//! Unique identifiers for CAIRN entities.
//!
//! Instance identifiers are name-based UUIDs so that the same instance name
//! always maps to the same id. Execution identifiers are random.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Node instance identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Derive the id of a node instance from its unique name
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inst_{}", self.0)
    }
}

/// Relationship instance identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipId(Uuid);

impl RelationshipId {
    /// Derive the id of a relationship instance from its relationship node
    /// and both endpoints
    #[must_use]
    pub fn from_endpoints(relationship_node: &str, source: InstanceId, target: InstanceId) -> Self {
        let mut key = Vec::with_capacity(relationship_node.len() + 32);
        key.extend_from_slice(relationship_node.as_bytes());
        key.extend_from_slice(source.as_uuid().as_bytes());
        key.extend_from_slice(target.as_uuid().as_bytes());
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, &key))
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rel_{}", self.0)
    }
}

/// Workflow execution identifier - one per install/uninstall run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Create a new random ExecutionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exec_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_is_name_based() {
        assert_eq!(InstanceId::from_name("web_1"), InstanceId::from_name("web_1"));
        assert_ne!(InstanceId::from_name("web_1"), InstanceId::from_name("web_2"));
    }

    #[test]
    fn test_relationship_id_depends_on_direction() {
        let a = InstanceId::from_name("war_1");
        let b = InstanceId::from_name("lb_1");
        let forward = RelationshipId::from_endpoints("war_to_lb", a, b);
        let backward = RelationshipId::from_endpoints("war_to_lb", b, a);
        assert_ne!(forward, backward);
        assert_eq!(forward, RelationshipId::from_endpoints("war_to_lb", a, b));
    }

    #[test]
    fn test_relationship_id_depends_on_relationship_node() {
        let a = InstanceId::from_name("war_1");
        let b = InstanceId::from_name("lb_1");
        assert_ne!(
            RelationshipId::from_endpoints("war_to_lb", a, b),
            RelationshipId::from_endpoints("war_monitors_lb", a, b)
        );
    }

    #[test]
    fn test_execution_ids_unique() {
        assert_ne!(ExecutionId::new(), ExecutionId::new());
    }

    #[test]
    fn test_display_prefixes() {
        assert!(InstanceId::from_name("x").to_string().starts_with("inst_"));
        assert!(ExecutionId::new().to_string().starts_with("exec_"));
    }

    #[test]
    fn test_id_serde() {
        let id = InstanceId::from_name("java_1");
        let json = serde_json::to_string(&id).unwrap();
        let back: InstanceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
