//! Live node and relationship instances.
//!
//! Structural data (name, parent, host, endpoints) is fixed at creation.
//! Attributes and state are mutated in place by lifecycle operations, each
//! behind its own lock so an instance can be shared between the topology and
//! any number of running workflow executions.

use crate::lifecycle::{NodeLifecycle, RelationshipLifecycle};
use cairn_core::{CapabilitySet, InstanceId, Phase, RelationshipId};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Mutable attribute map of an instance
pub type Attributes = BTreeMap<String, Value>;

/// State of a freshly generated instance
pub const INITIAL_STATE: &str = "initial";

/// One running (or runnable) member of a scaling group
pub struct NodeInstance {
    /// Unique id, derived from the name
    pub id: InstanceId,
    /// Unique name, `{node}_{index}`
    pub name: String,
    /// Name of the deployment node this instance belongs to
    pub node: String,
    /// Index within the deployment node, starting at 1
    pub index: u32,
    /// Type name the lifecycle was constructed from
    pub type_name: String,
    /// Structural parent
    pub parent: Option<InstanceId>,
    /// Instance this one is hosted on
    pub host: Option<InstanceId>,
    /// Operations the type implements
    pub capabilities: CapabilitySet,
    lifecycle: Arc<dyn NodeLifecycle>,
    attributes: Mutex<Attributes>,
    state: Mutex<String>,
    monitor: Mutex<()>,
    configured: Mutex<BTreeSet<(Phase, String)>>,
}

impl NodeInstance {
    /// Create a new instance in the `initial` state
    #[must_use]
    pub fn new(
        node: &str,
        index: u32,
        type_name: &str,
        capabilities: CapabilitySet,
        lifecycle: Arc<dyn NodeLifecycle>,
    ) -> Self {
        let name = format!("{node}_{index}");
        Self {
            id: InstanceId::from_name(&name),
            name,
            node: node.to_string(),
            index,
            type_name: type_name.to_string(),
            parent: None,
            host: None,
            capabilities,
            lifecycle,
            attributes: Mutex::new(Attributes::new()),
            state: Mutex::new(INITIAL_STATE.to_string()),
            monitor: Mutex::new(()),
            configured: Mutex::new(BTreeSet::new()),
        }
    }

    /// Set the structural parent
    #[must_use]
    pub fn with_parent(mut self, parent: Option<InstanceId>) -> Self {
        self.parent = parent;
        self
    }

    /// Set the host
    #[must_use]
    pub fn with_host(mut self, host: Option<InstanceId>) -> Self {
        self.host = host;
        self
    }

    /// The lifecycle implementation
    #[must_use]
    pub fn lifecycle(&self) -> &Arc<dyn NodeLifecycle> {
        &self.lifecycle
    }

    /// Current state string
    #[must_use]
    pub fn state(&self) -> String {
        self.state.lock().clone()
    }

    /// Replace the state string
    pub fn set_state(&self, state: &str) {
        *self.state.lock() = state.to_string();
    }

    /// Read one attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes.lock().get(key).cloned()
    }

    /// Write one attribute, returning the previous value
    pub fn set_attribute(&self, key: &str, value: Value) -> Option<Value> {
        self.attributes.lock().insert(key.to_string(), value)
    }

    /// Copy of the whole attribute map
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.attributes.lock().clone()
    }

    /// Acquire the endpoint monitor held by relationship operations
    pub fn monitor(&self) -> MutexGuard<'_, ()> {
        self.monitor.lock()
    }

    /// Record that `phase` ran on this endpoint for `relationship_node`
    ///
    /// Returns `false` when it already ran, in which case the caller must
    /// skip the operation.
    pub fn mark_configured(&self, phase: Phase, relationship_node: &str) -> bool {
        self.configured
            .lock()
            .insert((phase, relationship_node.to_string()))
    }
}

impl std::fmt::Debug for NodeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInstance")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("parent", &self.parent)
            .field("host", &self.host)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// A directed link between two node instances
pub struct RelationshipInstance {
    /// Unique id, derived from the relationship node and both endpoints
    pub id: RelationshipId,
    /// Name of the relationship node this instance belongs to
    pub relationship: String,
    /// Type name the lifecycle was constructed from
    pub type_name: String,
    /// Source endpoint
    pub source: InstanceId,
    /// Target endpoint
    pub target: InstanceId,
    /// Operations the type implements
    pub capabilities: CapabilitySet,
    lifecycle: Arc<dyn RelationshipLifecycle>,
    attributes: Mutex<Attributes>,
    state: Mutex<String>,
}

impl RelationshipInstance {
    /// Create a new relationship instance in the `initial` state
    #[must_use]
    pub fn new(
        relationship: &str,
        type_name: &str,
        source: InstanceId,
        target: InstanceId,
        capabilities: CapabilitySet,
        lifecycle: Arc<dyn RelationshipLifecycle>,
    ) -> Self {
        Self {
            id: RelationshipId::from_endpoints(relationship, source, target),
            relationship: relationship.to_string(),
            type_name: type_name.to_string(),
            source,
            target,
            capabilities,
            lifecycle,
            attributes: Mutex::new(Attributes::new()),
            state: Mutex::new(INITIAL_STATE.to_string()),
        }
    }

    /// The lifecycle implementation
    #[must_use]
    pub fn lifecycle(&self) -> &Arc<dyn RelationshipLifecycle> {
        &self.lifecycle
    }

    /// Whether `instance` is one of the endpoints
    #[must_use]
    pub fn touches(&self, instance: InstanceId) -> bool {
        self.source == instance || self.target == instance
    }

    /// Current state string
    #[must_use]
    pub fn state(&self) -> String {
        self.state.lock().clone()
    }

    /// Replace the state string
    pub fn set_state(&self, state: &str) {
        *self.state.lock() = state.to_string();
    }

    /// Read one attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes.lock().get(key).cloned()
    }

    /// Write one attribute, returning the previous value
    pub fn set_attribute(&self, key: &str, value: Value) -> Option<Value> {
        self.attributes.lock().insert(key.to_string(), value)
    }

    /// Copy of the whole attribute map
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.attributes.lock().clone()
    }
}

impl std::fmt::Debug for RelationshipInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipInstance")
            .field("relationship", &self.relationship)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
