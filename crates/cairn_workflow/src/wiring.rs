//! Cross-instance dependency wiring.
//!
//! Edges come from three sources, applied once per workflow over every
//! bundle in the plan:
//!
//! 1. Structural: an instance and its host and parent.
//! 2. Declared: `depends_on` between nodes, resolved to instances.
//! 3. Relationship endpoints: each relationship instance makes its source
//!    depend on its target.
//!
//! A declared or relationship dependency on any structural ancestor (host,
//! parent, host of the host) is dropped. The structural edges already order
//! that pair, and wiring it twice would close a loop between the child's
//! create and the ancestor's pre-configure.

use crate::bundle::LifecycleBundle;
use crate::graph::GraphBuilder;
use crate::plan::WorkflowKind;
use crate::task::TaskId;
use cairn_core::{InstanceId, Phase, RelationshipId};
use cairn_topology::{RelationshipInstance, Topology};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

/// Bundles of one plan, keyed by instance
pub type Bundles = IndexMap<InstanceId, LifecycleBundle>;

/// Apply every wiring rule for `kind`
pub fn wire(
    builder: &mut GraphBuilder,
    kind: WorkflowKind,
    bundles: &Bundles,
    topology: &Topology,
    relationships: &IndexMap<RelationshipId, Arc<RelationshipInstance>>,
) {
    let (on_structural, on_dependency): (WireFn, WireFn) = match kind {
        WorkflowKind::Install => (wire_install_structural, wire_install_dependency),
        WorkflowKind::Uninstall => (wire_uninstall_structural, wire_uninstall_dependency),
    };

    let structural = structural_pairs(topology, bundles);
    let dependencies = dependency_pairs(topology, bundles, relationships);
    for (pairs, rule) in [(structural, on_structural), (dependencies, on_dependency)] {
        for (a, b) in pairs {
            if let (Some(a), Some(b)) = (bundles.get(&a), bundles.get(&b)) {
                rule(builder, a, b);
            }
        }
    }
}

type WireFn = fn(&mut GraphBuilder, &LifecycleBundle, &LifecycleBundle);

/// `(child, parent)` for every host or parent link inside the plan
#[must_use]
pub fn structural_pairs(
    topology: &Topology,
    bundles: &Bundles,
) -> Vec<(InstanceId, InstanceId)> {
    bundles
        .keys()
        .flat_map(|child| {
            topology
                .structural_parents(*child)
                .into_iter()
                .filter(|parent| bundles.contains_key(parent))
                .map(move |parent| (*child, parent))
        })
        .collect()
}

/// `(dependent, dependency)` for every declared dependency and every
/// relationship instance inside the plan
#[must_use]
pub fn dependency_pairs(
    topology: &Topology,
    bundles: &Bundles,
    relationships: &IndexMap<RelationshipId, Arc<RelationshipInstance>>,
) -> Vec<(InstanceId, InstanceId)> {
    let declared = bundles.keys().flat_map(|dependent| {
        topology
            .dependency_targets(*dependent)
            .into_iter()
            .map(move |dependency| (*dependent, dependency))
    });
    let linked = relationships.values().map(|rel| (rel.source, rel.target));

    let mut pairs: IndexSet<(InstanceId, InstanceId)> = IndexSet::new();
    for (dependent, dependency) in declared.chain(linked) {
        if dependent == dependency
            || !bundles.contains_key(&dependent)
            || !bundles.contains_key(&dependency)
            || topology.structural_ancestors(dependent).contains(&dependency)
        {
            continue;
        }
        pairs.insert((dependent, dependency));
    }
    pairs.into_iter().collect()
}

fn after(builder: &mut GraphBuilder, later: &[TaskId], earlier: &[TaskId]) {
    for task in later {
        builder.depends_on(*task, earlier);
    }
}

/// The host or parent must be started before the child is created, and only
/// learns about the child once the child has started
fn wire_install_structural(
    builder: &mut GraphBuilder,
    child: &LifecycleBundle,
    parent: &LifecycleBundle,
) {
    after(builder, &child.tasks_for(&[Phase::Create]), &parent.tasks_for(&[Phase::Start]));
    after(
        builder,
        &parent.tasks_for(&[Phase::AddSource]),
        &child.tasks_for(&[Phase::Start]),
    );
}

/// The dependent configures once the dependency runs; the dependency
/// configures once the dependent exists and learns about it once it started
fn wire_install_dependency(
    builder: &mut GraphBuilder,
    dependent: &LifecycleBundle,
    dependency: &LifecycleBundle,
) {
    let pre_configure = [Phase::PreConfigureSource, Phase::PreConfigureTarget];
    after(
        builder,
        &dependent.tasks_for(&pre_configure),
        &dependency.tasks_for(&[Phase::Start]),
    );
    after(
        builder,
        &dependency.tasks_for(&pre_configure),
        &dependent.tasks_for(&[Phase::Create]),
    );
    after(
        builder,
        &dependency.tasks_for(&[Phase::AddSource]),
        &dependent.tasks_for(&[Phase::Start]),
    );
}

/// The parent stops after the child is deleted; the child stops once the
/// parent acknowledged the detach
fn wire_uninstall_structural(
    builder: &mut GraphBuilder,
    child: &LifecycleBundle,
    parent: &LifecycleBundle,
) {
    after(builder, &parent.tasks_for(&[Phase::Stop]), &child.tasks_for(&[Phase::Delete]));
    after(
        builder,
        &child.tasks_for(&[Phase::Stop]),
        &parent.tasks_for(&[Phase::RemoveSource]),
    );
}

/// The dependency outlives the dependent
fn wire_uninstall_dependency(
    builder: &mut GraphBuilder,
    dependent: &LifecycleBundle,
    dependency: &LifecycleBundle,
) {
    after(builder, &dependency.tasks_for(&[Phase::Stop]), &dependent.tasks_for(&[Phase::Stop]));
    after(
        builder,
        &dependent.tasks_for(&[Phase::Stop]),
        &dependency.tasks_for(&[Phase::RemoveSource]),
    );
}
