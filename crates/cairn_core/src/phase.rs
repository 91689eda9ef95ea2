//! Lifecycle phases.
//!
//! Node phases run on the instance itself. Relationship phases are attributed
//! to one endpoint of a relationship: source-side phases run on the source
//! node, target-side phases run on the target node.

use crate::capability::Capability;
use serde::{Deserialize, Serialize};

/// Which end of a relationship a phase is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endpoint {
    /// The node the relationship starts from
    Source,
    /// The node the relationship points to
    Target,
}

/// A single lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Provision the instance
    Create,
    /// Prepare the source side of each outgoing relationship
    PreConfigureSource,
    /// Prepare the target side of each incoming relationship
    PreConfigureTarget,
    /// Configure the instance
    Configure,
    /// Finish the source side of each outgoing relationship
    PostConfigureSource,
    /// Finish the target side of each incoming relationship
    PostConfigureTarget,
    /// Start the instance
    Start,
    /// Target learns that a source is available
    AddSource,
    /// Source learns that a target is available
    AddTarget,
    /// Target learns that a source is going away
    RemoveSource,
    /// Source learns that a target is going away
    RemoveTarget,
    /// Stop the instance
    Stop,
    /// Release the instance
    Delete,
}

impl Phase {
    /// Every phase
    pub const ALL: [Phase; 13] = [
        Phase::Create,
        Phase::PreConfigureSource,
        Phase::PreConfigureTarget,
        Phase::Configure,
        Phase::PostConfigureSource,
        Phase::PostConfigureTarget,
        Phase::Start,
        Phase::AddSource,
        Phase::AddTarget,
        Phase::RemoveSource,
        Phase::RemoveTarget,
        Phase::Stop,
        Phase::Delete,
    ];

    /// Install phases in intra-instance order
    pub const INSTALL: [Phase; 9] = [
        Phase::Create,
        Phase::PreConfigureSource,
        Phase::PreConfigureTarget,
        Phase::Configure,
        Phase::PostConfigureSource,
        Phase::PostConfigureTarget,
        Phase::Start,
        Phase::AddSource,
        Phase::AddTarget,
    ];

    /// Uninstall phases in intra-instance order
    pub const UNINSTALL: [Phase; 4] = [
        Phase::RemoveSource,
        Phase::RemoveTarget,
        Phase::Stop,
        Phase::Delete,
    ];

    /// Endpoint a relationship phase runs on, `None` for node phases
    #[must_use]
    pub const fn endpoint(self) -> Option<Endpoint> {
        match self {
            Self::PreConfigureSource
            | Self::PostConfigureSource
            | Self::AddTarget
            | Self::RemoveTarget => Some(Endpoint::Source),
            Self::PreConfigureTarget
            | Self::PostConfigureTarget
            | Self::AddSource
            | Self::RemoveSource => Some(Endpoint::Target),
            Self::Create | Self::Configure | Self::Start | Self::Stop | Self::Delete => None,
        }
    }

    /// Whether this phase fans out over relationship instances
    #[must_use]
    pub const fn is_relationship(self) -> bool {
        self.endpoint().is_some()
    }

    /// Whether an endpoint runs this phase at most once per relationship node
    #[must_use]
    pub const fn is_deduplicated(self) -> bool {
        matches!(
            self,
            Self::PreConfigureSource
                | Self::PreConfigureTarget
                | Self::PostConfigureSource
                | Self::PostConfigureTarget
        )
    }

    /// Capability a type must declare for this phase to do anything
    #[must_use]
    pub const fn required_capability(self) -> Capability {
        match self {
            Self::Create => Capability::Creatable,
            Self::Configure => Capability::Configurable,
            Self::Start => Capability::Startable,
            Self::Stop => Capability::Stoppable,
            Self::Delete => Capability::Deletable,
            Self::PreConfigureSource | Self::PostConfigureSource => Capability::SourceConfigurable,
            Self::PreConfigureTarget | Self::PostConfigureTarget => Capability::TargetConfigurable,
            Self::AddSource | Self::RemoveSource => Capability::SourceAware,
            Self::AddTarget | Self::RemoveTarget => Capability::TargetAware,
        }
    }

    /// State strings an instance moves through for a node phase:
    /// `(in progress, done)`
    #[must_use]
    pub const fn node_states(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Create => Some(("creating", "created")),
            Self::Configure => Some(("configuring", "configured")),
            Self::Start => Some(("starting", "started")),
            Self::Stop => Some(("stopping", "stopped")),
            Self::Delete => Some(("deleting", "deleted")),
            _ => None,
        }
    }

    /// Snake-case name of the phase
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::PreConfigureSource => "pre_configure_source",
            Self::PreConfigureTarget => "pre_configure_target",
            Self::Configure => "configure",
            Self::PostConfigureSource => "post_configure_source",
            Self::PostConfigureTarget => "post_configure_target",
            Self::Start => "start",
            Self::AddSource => "add_source",
            Self::AddTarget => "add_target",
            Self::RemoveSource => "remove_source",
            Self::RemoveTarget => "remove_target",
            Self::Stop => "stop",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
