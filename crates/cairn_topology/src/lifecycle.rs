//! Lifecycle traits implemented by drivers.
//!
//! Every method has a no-op default, so a driver only overrides the
//! operations its type declares in its capability set. Operations are
//! blocking and may take arbitrarily long.

use crate::error::OperationResult;
use crate::instance::{NodeInstance, RelationshipInstance};
use cairn_core::{Endpoint, InstanceId};
use serde_json::Value;

/// View of a node instance handed to a node operation
pub struct NodeContext<'a> {
    instance: &'a NodeInstance,
}

impl<'a> NodeContext<'a> {
    /// Wrap an instance
    #[must_use]
    pub fn new(instance: &'a NodeInstance) -> Self {
        Self { instance }
    }

    /// The instance being operated on
    #[must_use]
    pub fn instance(&self) -> &'a NodeInstance {
        self.instance
    }

    /// Instance id
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.instance.id
    }

    /// Instance name
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.instance.name
    }

    /// Read an attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.instance.attribute(key)
    }

    /// Write an attribute
    pub fn set_attribute(&self, key: &str, value: impl Into<Value>) {
        self.instance.set_attribute(key, value.into());
    }
}

/// View of a relationship instance and both endpoints
pub struct RelationshipContext<'a> {
    relationship: &'a RelationshipInstance,
    source: &'a NodeInstance,
    target: &'a NodeInstance,
    side: Endpoint,
}

impl<'a> RelationshipContext<'a> {
    /// Wrap a relationship seen from one endpoint
    #[must_use]
    pub fn new(
        relationship: &'a RelationshipInstance,
        source: &'a NodeInstance,
        target: &'a NodeInstance,
        side: Endpoint,
    ) -> Self {
        Self {
            relationship,
            source,
            target,
            side,
        }
    }

    /// The relationship instance
    #[must_use]
    pub fn relationship(&self) -> &'a RelationshipInstance {
        self.relationship
    }

    /// Source endpoint
    #[must_use]
    pub fn source(&self) -> NodeContext<'a> {
        NodeContext::new(self.source)
    }

    /// Target endpoint
    #[must_use]
    pub fn target(&self) -> NodeContext<'a> {
        NodeContext::new(self.target)
    }

    /// Endpoint the operation runs on
    #[must_use]
    pub fn side(&self) -> Endpoint {
        self.side
    }

    /// The other endpoint
    #[must_use]
    pub fn peer(&self) -> NodeContext<'a> {
        match self.side {
            Endpoint::Source => self.target(),
            Endpoint::Target => self.source(),
        }
    }

    /// Read a relationship attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.relationship.attribute(key)
    }

    /// Write a relationship attribute
    pub fn set_attribute(&self, key: &str, value: impl Into<Value>) {
        self.relationship.set_attribute(key, value.into());
    }
}

/// Operations of a node type
#[allow(unused_variables)]
pub trait NodeLifecycle: Send + Sync {
    /// Provision the instance
    fn create(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Configure the instance
    fn configure(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Start the instance
    fn start(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Stop the instance
    fn stop(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Release the instance
    fn delete(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        Ok(())
    }
}

/// Operations of a relationship type
#[allow(unused_variables)]
pub trait RelationshipLifecycle: Send + Sync {
    /// Runs on the source before it is configured
    fn pre_configure_source(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Runs on the target before it is configured
    fn pre_configure_target(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Runs on the source after it is configured
    fn post_configure_source(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Runs on the target after it is configured
    fn post_configure_target(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Tells the target about a started source
    fn add_source(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Tells the source about a started target
    fn add_target(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Tells the target a source is leaving
    fn remove_source(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        Ok(())
    }

    /// Tells the source a target is leaving
    fn remove_target(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        Ok(())
    }
}

/// Lifecycle that does nothing, for types with no driver behind them
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycle;

impl NodeLifecycle for NoopLifecycle {}

impl RelationshipLifecycle for NoopLifecycle {}
