//! Invocation of the lifecycle operation behind a task.

use crate::error::{WorkflowError, WorkflowResult};
use cairn_core::{CoreError, Endpoint, InstanceId, Phase, RelationshipId};
use cairn_topology::{
    NodeContext, NodeInstance, OperationError, RelationshipContext, RelationshipInstance,
};
use indexmap::IndexMap;
use std::sync::Arc;

/// What one task did
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Outcome {
    pub invoked: u64,
    pub skipped: u64,
}

/// Instances visible to a running execution
pub(crate) struct Scope<'a> {
    pub instances: &'a IndexMap<InstanceId, Arc<NodeInstance>>,
    pub relationships: &'a IndexMap<RelationshipId, Arc<RelationshipInstance>>,
}

impl Scope<'_> {
    fn instance(&self, id: InstanceId) -> WorkflowResult<&Arc<NodeInstance>> {
        self.instances
            .get(&id)
            .ok_or_else(|| CoreError::not_found("instance", id).into())
    }

    /// Run `phase` on `instance`
    pub fn invoke(&self, instance: InstanceId, phase: Phase) -> WorkflowResult<Outcome> {
        let inst = self.instance(instance)?;
        match phase.endpoint() {
            None => self.invoke_node(inst, phase),
            Some(side) => self.invoke_relationships(inst, phase, side),
        }
    }

    fn invoke_node(&self, inst: &NodeInstance, phase: Phase) -> WorkflowResult<Outcome> {
        let (doing, done) = phase.node_states().unwrap_or(("", ""));
        let mut outcome = Outcome::default();
        if inst.capabilities.supports(phase) {
            inst.set_state(doing);
            let ctx = NodeContext::new(inst);
            let lifecycle = inst.lifecycle();
            let result = match phase {
                Phase::Create => lifecycle.create(&ctx),
                Phase::Configure => lifecycle.configure(&ctx),
                Phase::Start => lifecycle.start(&ctx),
                Phase::Stop => lifecycle.stop(&ctx),
                Phase::Delete => lifecycle.delete(&ctx),
                _ => Ok(()),
            };
            result.map_err(|e| failed(inst, phase, e))?;
            outcome.invoked += 1;
        } else {
            outcome.skipped += 1;
        }
        inst.set_state(done);
        Ok(outcome)
    }

    fn invoke_relationships(
        &self,
        inst: &NodeInstance,
        phase: Phase,
        side: Endpoint,
    ) -> WorkflowResult<Outcome> {
        let mut outcome = Outcome::default();
        let attached = self.relationships.values().filter(|rel| match side {
            Endpoint::Source => rel.source == inst.id,
            Endpoint::Target => rel.target == inst.id,
        });
        for rel in attached {
            if !rel.capabilities.supports(phase)
                || (phase.is_deduplicated() && !inst.mark_configured(phase, &rel.relationship))
            {
                outcome.skipped += 1;
                continue;
            }
            let source = self.instance(rel.source)?;
            let target = self.instance(rel.target)?;

            let _monitor = inst.monitor();
            let ctx = RelationshipContext::new(rel, source, target, side);
            let lifecycle = rel.lifecycle();
            let result = match phase {
                Phase::PreConfigureSource => lifecycle.pre_configure_source(&ctx),
                Phase::PreConfigureTarget => lifecycle.pre_configure_target(&ctx),
                Phase::PostConfigureSource => lifecycle.post_configure_source(&ctx),
                Phase::PostConfigureTarget => lifecycle.post_configure_target(&ctx),
                Phase::AddSource => lifecycle.add_source(&ctx),
                Phase::AddTarget => lifecycle.add_target(&ctx),
                Phase::RemoveSource => lifecycle.remove_source(&ctx),
                Phase::RemoveTarget => lifecycle.remove_target(&ctx),
                _ => Ok(()),
            };
            result.map_err(|e| failed(inst, phase, e))?;
            rel.set_state(relationship_state(phase));
            outcome.invoked += 1;
        }
        Ok(outcome)
    }
}

fn failed(inst: &NodeInstance, phase: Phase, err: OperationError) -> WorkflowError {
    WorkflowError::OperationFailed {
        instance: inst.name.clone(),
        phase,
        source: Arc::new(err),
    }
}

fn relationship_state(phase: Phase) -> &'static str {
    match phase {
        Phase::PreConfigureSource | Phase::PreConfigureTarget => "pre_configured",
        Phase::PostConfigureSource | Phase::PostConfigureTarget => "configured",
        Phase::AddSource | Phase::AddTarget => "established",
        _ => "removed",
    }
}
