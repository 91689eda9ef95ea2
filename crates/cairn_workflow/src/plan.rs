//! Workflow plans: the wired task graph of one install or uninstall run,
//! together with the instances it touches.

use crate::bundle::LifecycleBundle;
use crate::error::WorkflowResult;
use crate::graph::{GraphBuilder, TaskGraph};
use crate::wiring::{self, Bundles};
use cairn_core::{CoreError, InstanceId, RelationshipId};
use cairn_topology::{NodeInstance, RelationshipInstance, Topology};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Direction of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Bring instances up
    Install,
    /// Tear instances down
    Uninstall,
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Install => f.write_str("install"),
            Self::Uninstall => f.write_str("uninstall"),
        }
    }
}

/// A wired task graph ready to run
///
/// Holds `Arc`s to every instance it needs, so it stays valid if the
/// topology changes while it runs.
#[derive(Debug, Clone)]
pub struct WorkflowPlan {
    kind: WorkflowKind,
    graph: TaskGraph,
    instances: IndexMap<InstanceId, Arc<NodeInstance>>,
    mocks: IndexSet<InstanceId>,
    relationships: IndexMap<RelationshipId, Arc<RelationshipInstance>>,
}

impl WorkflowPlan {
    /// Build bundles and wiring for a subset of the topology
    ///
    /// Hosts, parents, declared dependencies and relationship endpoints of
    /// the subset that are not part of it get mock bundles.
    ///
    /// # Errors
    ///
    /// Returns error if an id is not in the topology
    pub fn build(
        topology: &Topology,
        kind: WorkflowKind,
        instances: &[InstanceId],
        relationships: &[RelationshipId],
    ) -> WorkflowResult<Self> {
        let mut members: IndexMap<InstanceId, Arc<NodeInstance>> = IndexMap::new();
        for id in instances {
            let inst = topology
                .instance(*id)
                .ok_or_else(|| CoreError::not_found("instance", id))?;
            members.insert(*id, Arc::clone(inst));
        }
        let mut links: IndexMap<RelationshipId, Arc<RelationshipInstance>> = IndexMap::new();
        for id in relationships {
            let rel = topology
                .relationship(*id)
                .ok_or_else(|| CoreError::not_found("relationship", id))?;
            links.insert(*id, Arc::clone(rel));
        }

        let referenced = members
            .keys()
            .flat_map(|id| {
                let mut refs = topology.structural_parents(*id);
                refs.extend(topology.dependency_targets(*id));
                refs
            })
            .chain(links.values().flat_map(|rel| [rel.source, rel.target]));
        let mut mocks: IndexSet<InstanceId> = IndexSet::new();
        let mut outside: Vec<Arc<NodeInstance>> = Vec::new();
        for id in referenced.collect::<Vec<_>>() {
            if members.contains_key(&id) || mocks.contains(&id) {
                continue;
            }
            let inst = topology
                .instance(id)
                .ok_or_else(|| CoreError::not_found("instance", id))?;
            mocks.insert(id);
            outside.push(Arc::clone(inst));
        }

        let mut builder = GraphBuilder::new();
        let mut bundles = Bundles::new();
        for inst in members.values() {
            bundles.insert(inst.id, LifecycleBundle::build(&mut builder, kind, inst, false));
        }
        for inst in &outside {
            bundles.insert(inst.id, LifecycleBundle::build(&mut builder, kind, inst, true));
        }
        wiring::wire(&mut builder, kind, &bundles, topology, &links);

        for inst in outside {
            members.insert(inst.id, inst);
        }
        Ok(Self {
            kind,
            graph: builder.build(),
            instances: members,
            mocks,
            relationships: links,
        })
    }

    /// Workflow direction
    #[must_use]
    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    /// The wired graph
    #[must_use]
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Every instance the plan touches, mocks included
    #[must_use]
    pub fn instances(&self) -> &IndexMap<InstanceId, Arc<NodeInstance>> {
        &self.instances
    }

    /// Instances only present as mock stand-ins
    #[must_use]
    pub fn mocks(&self) -> &IndexSet<InstanceId> {
        &self.mocks
    }

    /// Relationship instances of the run
    #[must_use]
    pub fn relationships(&self) -> &IndexMap<RelationshipId, Arc<RelationshipInstance>> {
        &self.relationships
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        WorkflowKind,
        TaskGraph,
        IndexMap<InstanceId, Arc<NodeInstance>>,
        IndexMap<RelationshipId, Arc<RelationshipInstance>>,
    ) {
        (self.kind, self.graph, self.instances, self.relationships)
    }
}

impl std::fmt::Display for WorkflowPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} plan: {} instances ({} mock), {} relationships, {} tasks, {} edges",
            self.kind,
            self.instances.len(),
            self.mocks.len(),
            self.relationships.len(),
            self.graph.len(),
            self.graph.edge_count()
        )?;
        write!(f, "{}", self.graph)
    }
}
