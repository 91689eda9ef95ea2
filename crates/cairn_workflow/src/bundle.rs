//! Lifecycle task bundles.
//!
//! A bundle is the set of tasks one instance goes through in one workflow,
//! wired in the fixed intra-instance order:
//!
//! - install: create, pre-configure (source, target), configure,
//!   post-configure (source, target), start, add (source, target)
//! - uninstall: remove (source, target), stop, delete
//!
//! Phases inside braces in the list above run concurrently.

use crate::graph::GraphBuilder;
use crate::plan::WorkflowKind;
use crate::task::TaskId;
use cairn_core::{InstanceId, Phase};
use cairn_topology::NodeInstance;
use indexmap::IndexMap;

/// Tasks of one instance, keyed by phase
#[derive(Debug, Clone)]
pub struct LifecycleBundle {
    instance: InstanceId,
    mock: bool,
    tasks: IndexMap<Phase, TaskId>,
}

impl LifecycleBundle {
    /// Build the bundle of `kind` for an instance and wire its internal order
    ///
    /// With `mock` set, node phases are no-ops standing in for an instance
    /// that is outside the current run. Relationship phases stay real.
    pub fn build(
        builder: &mut GraphBuilder,
        kind: WorkflowKind,
        instance: &NodeInstance,
        mock: bool,
    ) -> Self {
        let phases: &[Phase] = match kind {
            WorkflowKind::Install => &Phase::INSTALL,
            WorkflowKind::Uninstall => &Phase::UNINSTALL,
        };
        let tasks: IndexMap<Phase, TaskId> = phases
            .iter()
            .map(|phase| {
                let id = builder.add_task(
                    instance.id,
                    &instance.name,
                    *phase,
                    mock && !phase.is_relationship(),
                );
                (*phase, id)
            })
            .collect();

        let bundle = Self {
            instance: instance.id,
            mock,
            tasks,
        };
        match kind {
            WorkflowKind::Install => bundle.wire_install(builder),
            WorkflowKind::Uninstall => bundle.wire_uninstall(builder),
        }
        bundle
    }

    fn wire_install(&self, builder: &mut GraphBuilder) {
        self.chain(
            builder,
            &[Phase::PreConfigureSource, Phase::PreConfigureTarget],
            &[Phase::Create],
        );
        self.chain(
            builder,
            &[Phase::Configure],
            &[Phase::PreConfigureSource, Phase::PreConfigureTarget],
        );
        self.chain(
            builder,
            &[Phase::PostConfigureSource, Phase::PostConfigureTarget],
            &[Phase::Configure],
        );
        self.chain(
            builder,
            &[Phase::Start],
            &[Phase::PostConfigureSource, Phase::PostConfigureTarget],
        );
        self.chain(builder, &[Phase::AddSource, Phase::AddTarget], &[Phase::Start]);
    }

    fn wire_uninstall(&self, builder: &mut GraphBuilder) {
        self.chain(builder, &[Phase::Stop], &[Phase::RemoveSource, Phase::RemoveTarget]);
        self.chain(builder, &[Phase::Delete], &[Phase::Stop]);
    }

    /// Every phase in `later` waits for every phase in `earlier`
    fn chain(&self, builder: &mut GraphBuilder, later: &[Phase], earlier: &[Phase]) {
        let before: Vec<TaskId> = earlier.iter().filter_map(|p| self.task(*p)).collect();
        for phase in later {
            if let Some(task) = self.task(*phase) {
                builder.depends_on(task, &before);
            }
        }
    }

    /// Instance the bundle belongs to
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Whether the bundle stands in for an instance outside the run
    #[must_use]
    pub fn is_mock(&self) -> bool {
        self.mock
    }

    /// Task for a phase, `None` if the phase is not part of this workflow
    #[must_use]
    pub fn task(&self, phase: Phase) -> Option<TaskId> {
        self.tasks.get(&phase).copied()
    }

    /// Tasks for several phases
    #[must_use]
    pub fn tasks_for(&self, phases: &[Phase]) -> Vec<TaskId> {
        phases.iter().filter_map(|p| self.task(*p)).collect()
    }

    /// All tasks with their phases
    pub fn tasks(&self) -> impl Iterator<Item = (Phase, TaskId)> + '_ {
        self.tasks.iter().map(|(p, t)| (*p, *t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::CapabilitySet;
    use cairn_topology::NoopLifecycle;
    use std::sync::Arc;

    fn instance() -> NodeInstance {
        NodeInstance::new("Web", 1, "Compute", CapabilitySet::full_node(), Arc::new(NoopLifecycle))
    }

    #[test]
    fn test_install_order() {
        let mut builder = GraphBuilder::new();
        let inst = instance();
        let bundle = LifecycleBundle::build(&mut builder, WorkflowKind::Install, &inst, false);
        let graph = builder.build();

        assert_eq!(graph.len(), 9);
        assert_eq!(graph.runnable(), vec![bundle.task(Phase::Create).unwrap()]);
        let start = bundle.task(Phase::Start).unwrap();
        for phase in [
            Phase::Create,
            Phase::PreConfigureTarget,
            Phase::Configure,
            Phase::PostConfigureSource,
        ] {
            assert!(graph.reaches(start, bundle.task(phase).unwrap()), "start must follow {phase}");
        }
        let configure = bundle.task(Phase::Configure).unwrap();
        assert_eq!(graph.task(configure).unwrap().depends_on().len(), 2);
        assert!(!graph.reaches(
            bundle.task(Phase::AddSource).unwrap(),
            bundle.task(Phase::AddTarget).unwrap()
        ));
        assert!(bundle.task(Phase::Stop).is_none());
    }

    #[test]
    fn test_uninstall_order() {
        let mut builder = GraphBuilder::new();
        let inst = instance();
        let bundle = LifecycleBundle::build(&mut builder, WorkflowKind::Uninstall, &inst, false);
        let graph = builder.build();

        assert_eq!(graph.len(), 4);
        assert_eq!(
            graph.runnable(),
            bundle.tasks_for(&[Phase::RemoveSource, Phase::RemoveTarget])
        );
        let delete = bundle.task(Phase::Delete).unwrap();
        assert!(graph.reaches(delete, bundle.task(Phase::RemoveTarget).unwrap()));
    }

    #[test]
    fn test_mock_bundle_keeps_relationship_phases_real() {
        let mut builder = GraphBuilder::new();
        let inst = instance();
        let bundle = LifecycleBundle::build(&mut builder, WorkflowKind::Install, &inst, true);
        let graph = builder.build();

        assert!(bundle.is_mock());
        for (phase, id) in bundle.tasks() {
            assert_eq!(graph.task(id).unwrap().mock, !phase.is_relationship());
        }
    }
}
