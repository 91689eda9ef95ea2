//! Workflow engine.
//!
//! Entry point for install and uninstall runs: builds the plan (bundles and
//! wiring) for a subset of the topology, then hands it to a new
//! [`WorkflowExecution`] on the engine's worker pool. Calls return as soon
//! as the first tasks are submitted.

use crate::config::EngineConfig;
use crate::error::WorkflowResult;
use crate::execution::WorkflowExecution;
use crate::listener::ExecutionListener;
use crate::plan::{WorkflowKind, WorkflowPlan};
use crate::pool::WorkerPool;
use cairn_core::{InstanceId, RelationshipId};
use cairn_topology::Topology;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Builds and launches workflow executions
#[derive(Debug)]
pub struct WorkflowEngine {
    pool: WorkerPool,
    config: EngineConfig,
}

impl WorkflowEngine {
    /// Create an engine with its own worker pool
    ///
    /// # Errors
    ///
    /// Returns error if the worker pool cannot be started
    pub fn new(config: EngineConfig) -> WorkflowResult<Self> {
        Ok(Self {
            pool: WorkerPool::new(&config)?,
            config,
        })
    }

    /// Create an engine running tasks on an existing Tokio runtime
    #[must_use]
    pub fn with_handle(config: EngineConfig, handle: Handle) -> Self {
        Self {
            pool: WorkerPool::from_handle(handle),
            config,
        }
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Wire an install run without starting it
    ///
    /// # Errors
    ///
    /// Returns error if an id is not in the topology
    pub fn plan_install(
        &self,
        topology: &Topology,
        instances: &[InstanceId],
        relationships: &[RelationshipId],
    ) -> WorkflowResult<WorkflowPlan> {
        WorkflowPlan::build(topology, WorkflowKind::Install, instances, relationships)
    }

    /// Wire an uninstall run without starting it
    ///
    /// # Errors
    ///
    /// Returns error if an id is not in the topology
    pub fn plan_uninstall(
        &self,
        topology: &Topology,
        instances: &[InstanceId],
        relationships: &[RelationshipId],
    ) -> WorkflowResult<WorkflowPlan> {
        WorkflowPlan::build(topology, WorkflowKind::Uninstall, instances, relationships)
    }

    /// Install a set of instances and relationship instances
    ///
    /// # Errors
    ///
    /// Returns error if an id is not in the topology
    pub fn install(
        &self,
        topology: &Topology,
        instances: &[InstanceId],
        relationships: &[RelationshipId],
    ) -> WorkflowResult<WorkflowExecution> {
        let plan = self.plan_install(topology, instances, relationships)?;
        Ok(self.launch(plan, Vec::new()))
    }

    /// Uninstall a set of instances and relationship instances
    ///
    /// # Errors
    ///
    /// Returns error if an id is not in the topology
    pub fn uninstall(
        &self,
        topology: &Topology,
        instances: &[InstanceId],
        relationships: &[RelationshipId],
    ) -> WorkflowResult<WorkflowExecution> {
        let plan = self.plan_uninstall(topology, instances, relationships)?;
        Ok(self.launch(plan, Vec::new()))
    }

    /// Start a prepared plan
    #[must_use]
    pub fn launch(
        &self,
        plan: WorkflowPlan,
        listeners: Vec<Arc<dyn ExecutionListener>>,
    ) -> WorkflowExecution {
        WorkflowExecution::start_with_listeners(plan, self.pool.handle().clone(), listeners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::execution::ExecutionStatus;
    use cairn_core::Phase;
    use cairn_sim::SimEnvironment;
    use cairn_topology::{NodeDescription, RelationshipDescription, TopologyDescription};
    use proptest::prelude::*;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(EngineConfig::new().with_worker_threads(4)).unwrap()
    }

    fn web_java() -> TopologyDescription {
        TopologyDescription::new("web")
            .with_node(NodeDescription::new("WebServer", "Compute"))
            .with_node(NodeDescription::new("Java", "Software").with_host("WebServer"))
    }

    fn install_all(engine: &WorkflowEngine, topology: &Topology) -> WorkflowExecution {
        engine
            .install(topology, &topology.instance_ids(), &topology.relationship_ids())
            .unwrap()
    }

    #[test]
    fn test_hosted_instance_created_after_host_started() {
        let env = SimEnvironment::new();
        let topology = Topology::from_description(&web_java(), &env.registry()).unwrap();
        let engine = engine();

        assert!(install_all(&engine, &topology).wait_for_completion(TIMEOUT).unwrap());

        let journal = env.journal();
        let order = [
            ("WebServer_1", Phase::Create),
            ("WebServer_1", Phase::Configure),
            ("WebServer_1", Phase::Start),
            ("Java_1", Phase::Create),
            ("Java_1", Phase::Configure),
            ("Java_1", Phase::Start),
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|(inst, phase)| journal.position(inst, *phase).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "order was {positions:?}");
        for inst in topology.instances() {
            assert_eq!(inst.state(), "started");
        }
    }

    #[test]
    fn test_relationship_phases_run_once_per_instance() {
        let env = SimEnvironment::new();
        let desc = TopologyDescription::new("app")
            .with_node(NodeDescription::new("Db", "Compute"))
            .with_node(NodeDescription::new("App", "Compute").with_instances(1, 3, 3))
            .with_relationship(RelationshipDescription::new("app_db", "ConnectsTo", "App", "Db"));
        let topology = Topology::from_description(&desc, &env.registry()).unwrap();
        let engine = engine();

        let execution = install_all(&engine, &topology);
        assert!(execution.wait_for_completion(TIMEOUT).unwrap());

        let journal = env.journal();
        assert_eq!(journal.count("Db_1", Phase::AddSource), 3);
        assert_eq!(journal.count("Db_1", Phase::PreConfigureTarget), 1);
        assert_eq!(journal.count("Db_1", Phase::PostConfigureTarget), 1);
        for i in 1..=3 {
            let app = format!("App_{i}");
            assert_eq!(journal.count(&app, Phase::AddTarget), 1);
            assert_eq!(journal.count(&app, Phase::PreConfigureSource), 1);
            // the dependent configures only once its dependency runs
            assert!(
                journal.position(&app, Phase::PreConfigureSource)
                    > journal.position("Db_1", Phase::Start)
            );
            assert!(
                journal.position("Db_1", Phase::PreConfigureTarget)
                    > journal.position(&app, Phase::Create)
            );
            // the dependency learns about the dependent once it started
            assert!(
                journal.position(&app, Phase::Start) < journal.position("Db_1", Phase::AddSource)
            );
        }
        assert!(topology.relationships().all(|r| r.state() == "established"));

        env.journal().clear();
        let execution = engine
            .uninstall(&topology, &topology.instance_ids(), &topology.relationship_ids())
            .unwrap();
        assert!(execution.wait_for_completion(TIMEOUT).unwrap());

        let journal = env.journal();
        assert_eq!(journal.count("Db_1", Phase::RemoveSource), 3);
        for i in 1..=3 {
            let app = format!("App_{i}");
            assert!(
                journal.position("Db_1", Phase::RemoveSource) < journal.position(&app, Phase::Stop)
            );
            assert!(journal.position(&app, Phase::Stop) < journal.position("Db_1", Phase::Stop));
        }
    }

    #[test]
    fn test_pre_configure_dedup_across_relationship_instances() {
        let env = SimEnvironment::new();
        let desc = TopologyDescription::new("fanout")
            .with_node(NodeDescription::new("Client", "Compute"))
            .with_node(NodeDescription::new("Cache", "Compute").with_instances(1, 2, 2))
            .with_relationship(RelationshipDescription::new(
                "client_cache",
                "ConnectsTo",
                "Client",
                "Cache",
            ));
        let topology = Topology::from_description(&desc, &env.registry()).unwrap();
        let engine = engine();

        assert!(install_all(&engine, &topology).wait_for_completion(TIMEOUT).unwrap());

        let journal = env.journal();
        assert_eq!(journal.count("Client_1", Phase::PreConfigureSource), 1);
        assert_eq!(journal.count("Client_1", Phase::PostConfigureSource), 1);
        assert_eq!(journal.count("Client_1", Phase::AddTarget), 2);
    }

    #[test]
    fn test_declared_cycle_fails() {
        let env = SimEnvironment::new();
        let desc = TopologyDescription::new("cycle")
            .with_node(NodeDescription::new("A", "Compute").with_dependency("B"))
            .with_node(NodeDescription::new("B", "Compute").with_dependency("A"));
        let topology = Topology::from_description(&desc, &env.registry()).unwrap();
        let engine = engine();

        let execution = install_all(&engine, &topology);
        let err = execution.wait_for_completion(TIMEOUT).unwrap_err();
        assert!(err.is_cyclic(), "unexpected error {err}");
        assert_eq!(execution.status(), ExecutionStatus::Failed);
        match err {
            WorkflowError::CyclicDependency { remaining, dump, .. } => {
                assert_eq!(remaining, 16);
                assert!(dump.contains("A_1.pre_configure_source [pending] waits on"));
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(env.journal().count("A_1", Phase::Configure), 0);
    }

    #[test]
    fn test_dependency_on_grand_host_installs() {
        let declared = TopologyDescription::new("stack")
            .with_node(NodeDescription::new("Vm", "Compute"))
            .with_node(NodeDescription::new("Tomcat", "Software").with_host("Vm"))
            .with_node(
                NodeDescription::new("War", "Software")
                    .with_host("Tomcat")
                    .with_dependency("Vm"),
            );
        let linked = TopologyDescription::new("stack")
            .with_node(NodeDescription::new("Vm", "Compute"))
            .with_node(NodeDescription::new("Tomcat", "Software").with_host("Vm"))
            .with_node(NodeDescription::new("War", "Software").with_host("Tomcat"))
            .with_relationship(RelationshipDescription::new("war_vm", "ConnectsTo", "War", "Vm"));

        for desc in [declared, linked] {
            let env = SimEnvironment::new();
            let topology = Topology::from_description(&desc, &env.registry()).unwrap();
            let engine = engine();

            assert!(install_all(&engine, &topology).wait_for_completion(TIMEOUT).unwrap());
            let journal = env.journal();
            assert!(
                journal.position("Vm_1", Phase::Start) < journal.position("Tomcat_1", Phase::Create)
            );
            assert!(
                journal.position("Tomcat_1", Phase::Start)
                    < journal.position("War_1", Phase::Create)
            );
            assert!(topology.instances().all(|inst| inst.state() == "started"));

            let uninstall = engine
                .uninstall(&topology, &topology.instance_ids(), &topology.relationship_ids())
                .unwrap();
            assert!(uninstall.wait_for_completion(TIMEOUT).unwrap());
            assert!(topology.instances().all(|inst| inst.state() == "deleted"));
        }
    }

    #[test]
    fn test_failed_operation_stops_dependents() {
        let env = SimEnvironment::new();
        env.failures().fail("WebServer_1", Phase::Start);
        let topology = Topology::from_description(&web_java(), &env.registry()).unwrap();
        let engine = engine();

        let execution = install_all(&engine, &topology);
        let err = execution.wait_for_completion(TIMEOUT).unwrap_err();
        assert!(matches!(err, WorkflowError::OperationFailed { phase: Phase::Start, .. }));
        assert_eq!(env.journal().count("Java_1", Phase::Create), 0);
        assert_eq!(execution.metrics().tasks_failed, 1);
    }

    #[test]
    fn test_uninstall_reverse_order() {
        let env = SimEnvironment::new();
        let desc = web_java().with_relationship(RelationshipDescription::new(
            "java_on_web",
            "HostedOn",
            "Java",
            "WebServer",
        ));
        let topology = Topology::from_description(&desc, &env.registry()).unwrap();
        let engine = engine();
        assert!(install_all(&engine, &topology).wait_for_completion(TIMEOUT).unwrap());
        env.journal().clear();

        let execution = engine
            .uninstall(&topology, &topology.instance_ids(), &topology.relationship_ids())
            .unwrap();
        assert!(execution.wait_for_completion(TIMEOUT).unwrap());

        let journal = env.journal();
        assert!(journal.position("WebServer_1", Phase::RemoveSource).is_some());
        assert!(
            journal.position("WebServer_1", Phase::RemoveSource)
                < journal.position("Java_1", Phase::Stop)
        );
        assert!(
            journal.position("Java_1", Phase::Delete) < journal.position("WebServer_1", Phase::Stop)
        );
        assert!(
            journal.position("WebServer_1", Phase::Stop)
                < journal.position("WebServer_1", Phase::Delete)
        );
        for inst in topology.instances() {
            assert_eq!(inst.state(), "deleted");
        }
    }

    #[test]
    fn test_subset_install_mocks_existing_host() {
        let env = SimEnvironment::new();
        let desc = TopologyDescription::new("web")
            .with_node(NodeDescription::new("WebServer", "Compute"))
            .with_node(
                NodeDescription::new("Java", "Software")
                    .with_host("WebServer")
                    .with_instances(1, 3, 1),
            )
            .with_relationship(RelationshipDescription::new(
                "java_on_web",
                "HostedOn",
                "Java",
                "WebServer",
            ));
        let mut topology = Topology::from_description(&desc, &env.registry()).unwrap();
        let engine = engine();
        assert!(install_all(&engine, &topology).wait_for_completion(TIMEOUT).unwrap());
        env.journal().clear();

        let web = topology.instance_by_name("WebServer_1").unwrap().id;
        let fresh = topology.add_instances("Java", Some(web), 1).unwrap();
        let links = topology.generate_relationships();
        let plan = engine.plan_install(&topology, &fresh, &links).unwrap();
        assert_eq!(plan.mocks().len(), 1);
        assert!(plan.mocks().contains(&web));

        let execution = engine.launch(plan, Vec::new());
        assert!(execution.wait_for_completion(TIMEOUT).unwrap());

        let journal = env.journal();
        assert_eq!(journal.count("WebServer_1", Phase::Create), 0);
        assert_eq!(journal.count("WebServer_1", Phase::Start), 0);
        assert_eq!(journal.count("WebServer_1", Phase::AddSource), 1);
        assert!(
            journal.position("Java_2", Phase::Start)
                < journal.position("WebServer_1", Phase::AddSource)
        );
        assert_eq!(execution.metrics().tasks_mocked, 3);
    }

    #[test]
    fn test_plan_display_lists_tasks() {
        let env = SimEnvironment::new();
        let topology = Topology::from_description(&web_java(), &env.registry()).unwrap();
        let plan = engine()
            .plan_install(&topology, &topology.instance_ids(), &[])
            .unwrap();
        let text = plan.to_string();
        assert!(text.starts_with("install plan: 2 instances (0 mock), 0 relationships, 18 tasks"));
        assert!(text.contains("Java_1.create [pending] waits on WebServer_1.start"));
    }

    #[test]
    fn test_async_embedding() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let env = SimEnvironment::new();
        let topology = Topology::from_description(&web_java(), &env.registry()).unwrap();
        let engine = WorkflowEngine::with_handle(EngineConfig::new(), runtime.handle().clone());

        assert!(install_all(&engine, &topology).wait_for_completion(TIMEOUT).unwrap());
        assert_eq!(env.journal().count("Java_1", Phase::Start), 1);
    }

    /// Random forests of hosted nodes; unhosted nodes declare dependencies
    /// on earlier unhosted nodes
    fn acyclic_description() -> impl Strategy<Value = TopologyDescription> {
        (1usize..6)
            .prop_flat_map(|n| {
                (
                    Just(n),
                    proptest::collection::vec(proptest::option::of(0usize..8), n),
                    proptest::collection::vec(proptest::collection::vec(0usize..8, 0..3), n),
                    proptest::collection::vec(1u32..3, n),
                )
            })
            .prop_map(|(n, hosts, deps, counts)| {
                let mut desc = TopologyDescription::new("random");
                let mut roots: Vec<String> = Vec::new();
                for i in 0..n {
                    let name = format!("N{i}");
                    let mut node = NodeDescription::new(name.clone(), "Compute")
                        .with_instances(1, 3, counts[i]);
                    match hosts[i].filter(|_| i > 0) {
                        Some(h) => node = node.with_host(format!("N{}", h % i)),
                        None => {
                            for d in &deps[i] {
                                if roots.is_empty() {
                                    break;
                                }
                                let target = roots[d % roots.len()].clone();
                                if !node.depends_on.contains(&target) {
                                    node = node.with_dependency(target);
                                }
                            }
                            roots.push(name);
                        }
                    }
                    desc = desc.with_node(node);
                }
                desc
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_acyclic_install_then_uninstall(desc in acyclic_description()) {
            let env = SimEnvironment::new();
            let topology = Topology::from_description(&desc, &env.registry()).unwrap();
            let engine = engine();

            let install = install_all(&engine, &topology);
            prop_assert!(install.wait_for_completion(TIMEOUT).unwrap());
            for inst in topology.instances() {
                prop_assert_eq!(inst.state(), "started");
                prop_assert_eq!(env.journal().count(&inst.name, Phase::Create), 1);
            }

            let uninstall = engine
                .uninstall(&topology, &topology.instance_ids(), &topology.relationship_ids())
                .unwrap();
            prop_assert!(uninstall.wait_for_completion(TIMEOUT).unwrap());
            let journal = env.journal();
            for inst in topology.instances() {
                prop_assert_eq!(inst.state(), "deleted");
                for dep in topology.dependency_targets(inst.id) {
                    let dep = topology.instance(dep).unwrap();
                    if topology.structural_ancestors(inst.id).contains(&dep.id) {
                        continue;
                    }
                    prop_assert!(
                        journal.position(&inst.name, Phase::Stop)
                            < journal.position(&dep.name, Phase::Stop)
                    );
                }
            }
        }
    }
}
