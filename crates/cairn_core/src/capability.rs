//! Capability lookup for node and relationship types.
//!
//! A type declares the lifecycle operations it implements as a capability
//! set. A task whose phase needs a capability the type does not declare
//! completes without invoking anything.

use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A lifecycle operation group a type can implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Implements `create`
    Creatable,
    /// Implements `configure`
    Configurable,
    /// Implements `start`
    Startable,
    /// Implements `stop`
    Stoppable,
    /// Implements `delete`
    Deletable,
    /// Implements `pre_configure_source` and `post_configure_source`
    SourceConfigurable,
    /// Implements `pre_configure_target` and `post_configure_target`
    TargetConfigurable,
    /// Implements `add_source` and `remove_source`
    SourceAware,
    /// Implements `add_target` and `remove_target`
    TargetAware,
}

impl Capability {
    /// Whether this capability belongs to node types
    #[must_use]
    pub const fn is_node_capability(self) -> bool {
        matches!(
            self,
            Self::Creatable
                | Self::Configurable
                | Self::Startable
                | Self::Stoppable
                | Self::Deletable
        )
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Creatable => "Creatable",
            Self::Configurable => "Configurable",
            Self::Startable => "Startable",
            Self::Stoppable => "Stoppable",
            Self::Deletable => "Deletable",
            Self::SourceConfigurable => "SourceConfigurable",
            Self::TargetConfigurable => "TargetConfigurable",
            Self::SourceAware => "SourceAware",
            Self::TargetAware => "TargetAware",
        };
        f.write_str(name)
    }
}

/// A set of capabilities declared by a type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// Declared capabilities
    pub capabilities: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// Create a new empty capability set
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: BTreeSet::new(),
        }
    }

    /// Every node lifecycle capability
    #[must_use]
    pub fn full_node() -> Self {
        [
            Capability::Creatable,
            Capability::Configurable,
            Capability::Startable,
            Capability::Stoppable,
            Capability::Deletable,
        ]
        .into_iter()
        .collect()
    }

    /// Every relationship lifecycle capability
    #[must_use]
    pub fn full_relationship() -> Self {
        [
            Capability::SourceConfigurable,
            Capability::TargetConfigurable,
            Capability::SourceAware,
            Capability::TargetAware,
        ]
        .into_iter()
        .collect()
    }

    /// Grant a capability
    pub fn grant(&mut self, capability: Capability) {
        self.capabilities.insert(capability);
    }

    /// Builder form of [`CapabilitySet::grant`]
    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        self.grant(capability);
        self
    }

    /// Builder form removing a capability
    #[must_use]
    pub fn without(mut self, capability: Capability) -> Self {
        self.capabilities.remove(&capability);
        self
    }

    /// Check if a capability is declared
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Check if the operation behind a phase is implemented
    #[must_use]
    pub fn supports(&self, phase: Phase) -> bool {
        self.has(phase.required_capability())
    }

    /// Number of declared capabilities
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if no capability is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Iterate over declared capabilities
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_node_supports_node_phases() {
        let caps = CapabilitySet::full_node();
        for phase in [Phase::Create, Phase::Configure, Phase::Start, Phase::Stop, Phase::Delete] {
            assert!(caps.supports(phase), "{phase} should be supported");
        }
        assert!(!caps.supports(Phase::AddSource));
    }

    #[test]
    fn test_full_relationship_supports_relationship_phases() {
        let caps = CapabilitySet::full_relationship();
        for phase in Phase::INSTALL.iter().chain(Phase::UNINSTALL.iter()) {
            assert_eq!(caps.supports(*phase), phase.is_relationship());
        }
    }

    #[test]
    fn test_without() {
        let caps = CapabilitySet::full_node().without(Capability::Configurable);
        assert!(!caps.supports(Phase::Configure));
        assert_eq!(caps.len(), 4);
    }

    #[test]
    fn test_node_capability_partition() {
        assert!(CapabilitySet::full_node().iter().all(Capability::is_node_capability));
        assert!(!CapabilitySet::full_relationship().iter().any(Capability::is_node_capability));
    }

    proptest! {
        #[test]
        fn prop_grant_then_has(idx in 0usize..9) {
            let all: Vec<_> = CapabilitySet::full_node()
                .iter()
                .chain(CapabilitySet::full_relationship().iter())
                .collect();
            let cap = all[idx];
            let caps = CapabilitySet::new().with(cap);
            prop_assert!(caps.has(cap));
            prop_assert_eq!(caps.len(), 1);
        }
    }
}
