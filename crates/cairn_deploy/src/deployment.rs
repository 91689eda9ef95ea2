//! Deployment: one topology, one engine, one checkpoint log.
//!
//! The topology sits behind a lock so that a pruning listener can drop
//! uninstalled instances once their execution finishes. The lock is never
//! held while waiting on an execution.

use crate::checkpoint::CheckpointLog;
use crate::config::{CairnConfig, DeploymentConfig};
use crate::error::{DeployError, DeployResult};
use crate::impacter::{Impacter, ScaleImpact};
use cairn_core::{ExecutionId, InstanceId, RelationshipId};
use cairn_topology::{Topology, TopologyDescription, TopologySnapshot, TypeRegistry};
use cairn_workflow::{ExecutionListener, WorkflowEngine, WorkflowExecution, WorkflowPlan};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Removes uninstalled entries from the topology when the uninstall finishes
struct TopologyPruner {
    topology: Arc<RwLock<Topology>>,
    instances: Vec<InstanceId>,
    relationships: Vec<RelationshipId>,
}

impl ExecutionListener for TopologyPruner {
    fn on_finish(&self, execution: ExecutionId) {
        let removed = self
            .topology
            .write()
            .remove(&self.instances, &self.relationships);
        info!(execution = %execution, removed, "uninstalled entries removed from topology");
    }
}

/// What a scale call changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleReport {
    /// Node scaled
    pub node: String,
    /// Requested count per parent instance
    pub count: u32,
    /// Names of installed instances
    pub added: Vec<String>,
    /// Names of uninstalled and removed instances
    pub removed: Vec<String>,
    /// Relationship instances installed
    pub relationships_added: usize,
    /// Relationship instances uninstalled and removed
    pub relationships_removed: usize,
}

impl ScaleReport {
    /// Whether the call changed nothing
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.relationships_added == 0
            && self.relationships_removed == 0
    }
}

/// A deployed topology
pub struct Deployment {
    topology: Arc<RwLock<Topology>>,
    engine: WorkflowEngine,
    config: DeploymentConfig,
    checkpoints: CheckpointLog,
}

impl Deployment {
    /// Wrap an instantiated topology
    #[must_use]
    pub fn new(topology: Topology, engine: WorkflowEngine, config: DeploymentConfig) -> Self {
        Self {
            topology: Arc::new(RwLock::new(topology)),
            engine,
            config,
            checkpoints: CheckpointLog::new(),
        }
    }

    /// Instantiate a description and start an engine for it
    ///
    /// # Errors
    ///
    /// Returns error if the description is invalid or the engine cannot start
    pub fn from_description(
        desc: &TopologyDescription,
        registry: &TypeRegistry,
        config: &CairnConfig,
    ) -> DeployResult<Self> {
        let topology = Topology::from_description(desc, registry)?;
        let engine = WorkflowEngine::new(config.engine.clone())?;
        Ok(Self::new(topology, engine, config.deployment.clone()))
    }

    /// Read access to the topology; drop the guard before waiting
    pub fn topology(&self) -> RwLockReadGuard<'_, Topology> {
        self.topology.read()
    }

    /// Serializable view of the topology
    #[must_use]
    pub fn snapshot(&self) -> TopologySnapshot {
        self.topology.read().snapshot()
    }

    /// Checkpoints of every execution launched so far
    #[must_use]
    pub fn checkpoints(&self) -> &CheckpointLog {
        &self.checkpoints
    }

    /// Deployment configuration
    #[must_use]
    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// The workflow engine
    #[must_use]
    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Wire the install of the whole topology without running it
    ///
    /// # Errors
    ///
    /// Returns error if planning fails
    pub fn plan_install(&self) -> DeployResult<WorkflowPlan> {
        let topology = self.topology.read();
        Ok(self.engine.plan_install(
            &topology,
            &topology.instance_ids(),
            &topology.relationship_ids(),
        )?)
    }

    /// Wire the uninstall of the whole topology without running it
    ///
    /// # Errors
    ///
    /// Returns error if planning fails
    pub fn plan_uninstall(&self) -> DeployResult<WorkflowPlan> {
        let topology = self.topology.read();
        Ok(self.engine.plan_uninstall(
            &topology,
            &topology.instance_ids(),
            &topology.relationship_ids(),
        )?)
    }

    /// Install every instance and relationship instance
    ///
    /// Returns as soon as the first tasks are submitted.
    ///
    /// # Errors
    ///
    /// Returns error if planning fails
    pub fn install(&self) -> DeployResult<WorkflowExecution> {
        let plan = self.plan_install()?;
        Ok(self.launch(plan, "install", None))
    }

    /// Uninstall everything; the topology is emptied when the run finishes
    ///
    /// # Errors
    ///
    /// Returns error if planning fails
    pub fn uninstall(&self) -> DeployResult<WorkflowExecution> {
        let (instances, relationships) = {
            let topology = self.topology.read();
            (topology.instance_ids(), topology.relationship_ids())
        };
        self.uninstall_set(&instances, &relationships, "uninstall")
    }

    /// Block on an execution for at most the configured timeout
    ///
    /// # Errors
    ///
    /// Returns the execution's error, or [`DeployError::Timeout`]
    pub fn wait(&self, execution: &WorkflowExecution) -> DeployResult<()> {
        let timeout = self.config.workflow_timeout();
        if execution.wait_for_completion(timeout)? {
            Ok(())
        } else {
            Err(DeployError::Timeout {
                execution: execution.id(),
                timeout,
            })
        }
    }

    /// Scale a node to `count` instances per parent instance
    ///
    /// Scale-down uninstalls the highest-index instances with everything
    /// hosted on or under them, then removes them from the topology.
    /// Scale-up installs exactly the new instances and relationship
    /// instances; if that fails and rollback is enabled, the same set is
    /// uninstalled and removed again.
    ///
    /// # Errors
    ///
    /// Returns error if the count is out of bounds, or if an execution fails
    /// or times out
    pub fn scale(&mut self, node: &str, count: u32) -> DeployResult<ScaleReport> {
        let current = {
            let topology = self.topology.read();
            let bounds = topology.node(node)?.bounds;
            if !bounds.contains(count) {
                return Err(DeployError::ScaleOutOfBounds {
                    node: node.to_string(),
                    requested: count,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
            Impacter::counts(&topology, node)?
        };

        let mut report = ScaleReport {
            node: node.to_string(),
            count,
            ..ScaleReport::default()
        };
        if current.iter().all(|c| *c == count) {
            info!(node, count, "scale is a no-op");
            return Ok(report);
        }
        info!(node, from = ?current, to = count, "scaling");

        if current.iter().any(|c| *c > count) {
            let impact = Impacter::scale_down(&self.topology.read(), node, count)?;
            report.removed = self.names(&impact.instances);
            report.relationships_removed = impact.relationships.len();
            let execution = self.uninstall_set(
                &impact.instances,
                &impact.relationships,
                &format!("scale {node} to {count}: uninstall"),
            )?;
            self.wait(&execution)?;
        }

        if current.iter().any(|c| *c < count) {
            let impact = Impacter::scale_up(&mut self.topology.write(), node, count)?;
            report.added = self.names(&impact.instances);
            report.relationships_added = impact.relationships.len();
            self.install_impact(&impact, &format!("scale {node} to {count}: install"))?;
        }

        Ok(report)
    }

    fn install_impact(&self, impact: &ScaleImpact, label: &str) -> DeployResult<()> {
        let plan = {
            let topology = self.topology.read();
            self.engine
                .plan_install(&topology, &impact.instances, &impact.relationships)?
        };
        let execution = self.launch(plan, label, None);
        let Err(err) = self.wait(&execution) else {
            return Ok(());
        };

        if !self.config.rollback_on_failure {
            return Err(err);
        }
        if let DeployError::Timeout { .. } = err {
            // Tasks may still be running
            warn!(node = %impact.node, "scale-up timed out, skipping rollback");
            return Err(err);
        }

        warn!(node = %impact.node, error = %err, "scale-up failed, rolling back");
        let rollback = self
            .uninstall_set(
                &impact.instances,
                &impact.relationships,
                &format!("scale {}: rollback", impact.node),
            )
            .and_then(|execution| self.wait(&execution));
        if let Err(rollback_err) = rollback {
            warn!(node = %impact.node, error = %rollback_err, "rollback failed");
        }
        Err(err)
    }

    fn uninstall_set(
        &self,
        instances: &[InstanceId],
        relationships: &[RelationshipId],
        label: &str,
    ) -> DeployResult<WorkflowExecution> {
        let plan = {
            let topology = self.topology.read();
            self.engine
                .plan_uninstall(&topology, instances, relationships)?
        };
        let pruner: Arc<dyn ExecutionListener> = Arc::new(TopologyPruner {
            topology: Arc::clone(&self.topology),
            instances: instances.to_vec(),
            relationships: relationships.to_vec(),
        });
        Ok(self.launch(plan, label, Some(pruner)))
    }

    /// Start a plan with the checkpoint log and an optional extra listener
    ///
    /// Must not be called with the topology lock held: an empty plan
    /// finishes, and notifies listeners, on this thread.
    fn launch(
        &self,
        plan: WorkflowPlan,
        label: &str,
        extra: Option<Arc<dyn ExecutionListener>>,
    ) -> WorkflowExecution {
        let kind = plan.kind();
        let mut listeners: Vec<Arc<dyn ExecutionListener>> = extra.into_iter().collect();
        let checkpoints: Arc<dyn ExecutionListener> = Arc::new(self.checkpoints.clone());
        listeners.push(checkpoints);

        let execution = self.engine.launch(plan, Vec::new());
        self.checkpoints.started(execution.id(), label);
        for listener in listeners {
            execution.add_listener(listener);
        }
        info!(execution = %execution.id(), kind = %kind, label, "deployment launched execution");
        execution
    }

    fn names(&self, ids: &[InstanceId]) -> Vec<String> {
        let topology = self.topology.read();
        ids.iter()
            .filter_map(|id| topology.instance(*id))
            .map(|inst| inst.name.clone())
            .collect()
    }
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topology = self.topology.read();
        f.debug_struct("Deployment")
            .field("topology", &topology.name())
            .field("instances", &topology.instance_count())
            .field("relationships", &topology.relationship_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointKind;
    use cairn_workflow::WorkflowError;
    use cairn_core::Phase;
    use cairn_sim::SimEnvironment;
    use cairn_topology::{NodeDescription, RelationshipDescription};
    use cairn_workflow::EngineConfig;
    use proptest::prelude::*;
    use std::time::Duration;

    fn config() -> CairnConfig {
        CairnConfig {
            engine: EngineConfig::default().with_worker_threads(4),
            deployment: DeploymentConfig::new().with_workflow_timeout(Duration::from_secs(30)),
        }
    }

    fn web_java(default: u32) -> TopologyDescription {
        TopologyDescription::new("web")
            .with_node(NodeDescription::new("WebServer", "Compute").with_instances(1, 3, default))
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
            ))
    }

    fn war_lb(many_to_many: bool) -> TopologyDescription {
        TopologyDescription::new("war")
            .with_node(NodeDescription::new("Vm", "Compute").with_instances(1, 4, 1))
            .with_node(NodeDescription::new("Tomcat", "Software").with_host("Vm"))
            .with_node(NodeDescription::new("War", "Software").with_host("Tomcat"))
            .with_node(NodeDescription::new("ApacheLoadBalancer", "Software").with_host("Vm"))
            .with_relationship(
                RelationshipDescription::new("war_lb", "ConnectsTo", "War", "ApacheLoadBalancer")
                    .with_many_to_many(many_to_many),
            )
    }

    fn installed(env: &SimEnvironment, desc: &TopologyDescription) -> Deployment {
        let deployment = Deployment::from_description(desc, &env.registry(), &config()).unwrap();
        let execution = deployment.install().unwrap();
        deployment.wait(&execution).unwrap();
        env.journal().clear();
        deployment
    }

    fn state(deployment: &Deployment, name: &str) -> String {
        deployment.topology().instance_by_name(name).unwrap().state()
    }

    #[test]
    fn test_install_starts_everything() {
        let env = SimEnvironment::new();
        let deployment = installed(&env, &web_java(2));
        for name in ["WebServer_1", "WebServer_2", "Java_1", "Java_2"] {
            assert_eq!(state(&deployment, name), "started");
        }
        assert_eq!(
            deployment.checkpoints().kinds(),
            vec![CheckpointKind::Started, CheckpointKind::Finished]
        );
    }

    #[test]
    fn test_scale_down_web_server() {
        let env = SimEnvironment::new();
        let mut deployment = installed(&env, &web_java(2));

        let report = deployment.scale("WebServer", 1).unwrap();
        let mut removed = report.removed.clone();
        removed.sort();
        assert_eq!(removed, vec!["Java_2", "WebServer_2"]);
        assert_eq!(report.relationships_removed, 1);

        let journal = env.journal();
        assert!(
            journal.position("Java_2", Phase::Delete) < journal.position("WebServer_2", Phase::Stop)
        );
        assert_eq!(journal.count("WebServer_1", Phase::Stop), 0);
        assert_eq!(journal.count("Java_1", Phase::Stop), 0);

        let topology = deployment.topology();
        assert_eq!(topology.instance_count(), 2);
        assert_eq!(topology.relationship_count(), 1);
        assert!(topology.instance_by_name("WebServer_2").is_none());
    }

    #[test]
    fn test_scale_up_installs_only_new_instances() {
        let env = SimEnvironment::new();
        let mut deployment = installed(&env, &web_java(1));

        let report = deployment.scale("WebServer", 2).unwrap();
        assert_eq!(report.added, vec!["WebServer_2", "Java_2"]);
        assert_eq!(report.relationships_added, 1);

        let journal = env.journal();
        assert_eq!(journal.count("WebServer_1", Phase::Create), 0);
        assert!(
            journal.position("WebServer_2", Phase::Start)
                < journal.position("Java_2", Phase::Create)
        );
        assert_eq!(journal.count("WebServer_2", Phase::AddSource), 1);
        assert_eq!(state(&deployment, "Java_2"), "started");
    }

    #[test]
    fn test_sibling_isolation_on_scale() {
        let env = SimEnvironment::new();
        let mut deployment = installed(&env, &war_lb(false));
        deployment.scale("Vm", 2).unwrap();

        assert_eq!(deployment.topology().relationship_count(), 2);
        let journal = env.journal();
        assert_eq!(journal.count("ApacheLoadBalancer_1", Phase::AddSource), 0);
        assert_eq!(journal.count("ApacheLoadBalancer_2", Phase::AddSource), 1);
        let lb = deployment.snapshot().instance("ApacheLoadBalancer_2").cloned().unwrap();
        assert_eq!(lb.attributes.get("sources"), Some(&serde_json::json!(["War_2"])));
    }

    #[test]
    fn test_many_to_many_fans_out_on_scale() {
        let env = SimEnvironment::new();
        let mut deployment = installed(&env, &war_lb(true));
        deployment.scale("Vm", 2).unwrap();

        assert_eq!(deployment.topology().relationship_count(), 4);
        let journal = env.journal();
        assert_eq!(journal.count("ApacheLoadBalancer_1", Phase::AddSource), 1);
        assert_eq!(journal.count("ApacheLoadBalancer_2", Phase::AddSource), 2);
        assert_eq!(journal.count("War_1", Phase::AddTarget), 1);
    }

    #[test]
    fn test_scale_bounds_and_noop() {
        let env = SimEnvironment::new();
        let mut deployment = installed(&env, &web_java(2));

        let err = deployment.scale("WebServer", 4).unwrap_err();
        assert!(matches!(err, DeployError::ScaleOutOfBounds { requested: 4, min: 1, max: 3, .. }));
        assert!(matches!(deployment.scale("Nope", 1), Err(DeployError::Topology(_))));

        let report = deployment.scale("WebServer", 2).unwrap();
        assert!(report.is_noop());
        assert!(env.journal().is_empty());
        assert_eq!(deployment.checkpoints().len(), 2);
    }

    #[test]
    fn test_failed_scale_up_rolls_back() {
        let env = SimEnvironment::new();
        let mut deployment = installed(&env, &web_java(1));
        env.failures().fail("WebServer_2", Phase::Start);

        let err = deployment.scale("WebServer", 2).unwrap_err();
        assert!(matches!(
            err.as_workflow(),
            Some(WorkflowError::OperationFailed { phase: Phase::Start, .. })
        ));
        assert_eq!(env.journal().count("Java_2", Phase::Create), 0);
        assert_eq!(env.journal().count("WebServer_2", Phase::Delete), 1);
        assert_eq!(deployment.topology().instance_count(), 2);
        assert_eq!(
            deployment.checkpoints().kinds(),
            vec![
                CheckpointKind::Started,
                CheckpointKind::Finished,
                CheckpointKind::Started,
                CheckpointKind::Failed,
                CheckpointKind::Started,
                CheckpointKind::Finished,
            ]
        );

        env.failures().clear();
        let report = deployment.scale("WebServer", 2).unwrap();
        assert_eq!(report.added, vec!["WebServer_3", "Java_3"]);
    }

    #[test]
    fn test_failed_scale_up_without_rollback_keeps_instances() {
        let env = SimEnvironment::new();
        let desc = web_java(1);
        let mut cfg = config();
        cfg.deployment = cfg.deployment.with_rollback(false);
        let mut deployment = Deployment::from_description(&desc, &env.registry(), &cfg).unwrap();
        let execution = deployment.install().unwrap();
        deployment.wait(&execution).unwrap();
        env.failures().fail("Java_2", Phase::Configure);

        assert!(deployment.scale("WebServer", 2).is_err());
        assert_eq!(deployment.topology().instance_count(), 4);
        assert_eq!(state(&deployment, "WebServer_2"), "started");
        assert_eq!(env.journal().count("WebServer_2", Phase::Delete), 0);
    }

    #[test]
    fn test_uninstall_empties_topology() {
        let env = SimEnvironment::new();
        let deployment = installed(&env, &war_lb(false));
        let execution = deployment.uninstall().unwrap();
        deployment.wait(&execution).unwrap();

        assert_eq!(deployment.topology().instance_count(), 0);
        assert_eq!(deployment.topology().relationship_count(), 0);
        let journal = env.journal();
        assert!(
            journal.position("War_1", Phase::Delete) < journal.position("Tomcat_1", Phase::Stop)
        );
        assert!(
            journal.position("Tomcat_1", Phase::Delete) < journal.position("Vm_1", Phase::Stop)
        );
    }

    #[test]
    fn test_wait_times_out() {
        let env = SimEnvironment::new().with_latency(Duration::from_millis(50), Duration::ZERO);
        let mut cfg = config();
        cfg.deployment = cfg.deployment.with_workflow_timeout(Duration::from_millis(20));
        let deployment = Deployment::from_description(&web_java(1), &env.registry(), &cfg).unwrap();

        let execution = deployment.install().unwrap();
        let err = deployment.wait(&execution).unwrap_err();
        assert!(matches!(err, DeployError::Timeout { execution: id, .. } if id == execution.id()));
        execution.wait().unwrap();
    }

    #[test]
    fn test_plan_preview_does_not_run() {
        let env = SimEnvironment::new();
        let deployment =
            Deployment::from_description(&web_java(2), &env.registry(), &config()).unwrap();
        let plan = deployment.plan_install().unwrap();
        assert_eq!(plan.instances().len(), 4);
        assert!(env.journal().is_empty());
        assert!(deployment.checkpoints().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_scale_sequences_keep_counts(
            steps in prop::collection::vec((any::<bool>(), 1u32..=3), 1..5),
        ) {
            let env = SimEnvironment::new();
            let mut deployment = installed(&env, &web_java(1));
            // Java count under each web server, in creation order
            let mut java: Vec<usize> = vec![1];

            for (scale_web, count) in steps {
                if scale_web {
                    deployment.scale("WebServer", count).unwrap();
                    java.resize(count as usize, 1);
                } else {
                    deployment.scale("Java", count).unwrap();
                    java.iter_mut().for_each(|c| *c = count as usize);
                }

                let total: usize = java.iter().sum();
                let topology = deployment.topology();
                prop_assert_eq!(topology.instances_of("WebServer").len(), java.len());
                prop_assert_eq!(topology.instances_of("Java").len(), total);
                prop_assert_eq!(topology.relationship_count(), total);
                for inst in topology.instances() {
                    prop_assert_eq!(inst.state(), "started");
                }
            }
        }
    }
}
