//! Simulated node and relationship drivers.
//!
//! Every operation sleeps for a sampled latency, consults the failure plan
//! and appends to the journal under the instance the phase runs on. Drivers
//! also leave a few attributes behind (addresses, peer lists) the way real
//! drivers would.

use crate::failure::{FailureKind, FailurePlan};
use crate::journal::{Journal, JournalOutcome};
use crate::seed::{LatencyModel, SimSeed};
use cairn_core::{Endpoint, Phase};
use cairn_topology::{
    NodeContext, NodeKind, NodeLifecycle, OperationError, OperationResult, RelationshipContext,
    RelationshipKind, RelationshipLifecycle,
};
use parking_lot::Mutex;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// State shared by every simulated driver of one environment
#[derive(Debug)]
pub struct SimBackend {
    journal: Journal,
    failures: FailurePlan,
    latency: LatencyModel,
    rng: Mutex<ChaCha8Rng>,
}

impl SimBackend {
    /// Create a backend
    #[must_use]
    pub fn new(
        journal: Journal,
        failures: FailurePlan,
        latency: LatencyModel,
        seed: &SimSeed,
    ) -> Self {
        Self {
            journal,
            failures,
            latency,
            rng: Mutex::new(seed.into_rng()),
        }
    }

    /// Operation journal
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Failure plan
    #[must_use]
    pub fn failures(&self) -> &FailurePlan {
        &self.failures
    }

    /// Run one simulated operation on `ctx`
    fn perform(
        &self,
        ctx: &NodeContext<'_>,
        phase: Phase,
        relationship: Option<&str>,
    ) -> OperationResult<()> {
        if !self.latency.is_zero() {
            let delay = self.latency.sample(&mut self.rng.lock());
            std::thread::sleep(delay);
        }

        let instance = ctx.instance();
        let injected = self.failures.check(&instance.name, &instance.node, phase);
        let outcome = match injected {
            None => JournalOutcome::Ok,
            Some(FailureKind::Error) => JournalOutcome::Failed,
            Some(FailureKind::Panic) => JournalOutcome::Panicked,
        };
        self.journal.record(&instance.name, phase, relationship, outcome);
        debug!(instance = %instance.name, phase = %phase, ?outcome, "simulated operation");

        match injected {
            None => Ok(()),
            Some(FailureKind::Error) => Err(OperationError::new(format!(
                "injected failure: {}.{}",
                instance.name, phase
            ))),
            Some(FailureKind::Panic) => panic!("injected panic: {}.{}", instance.name, phase),
        }
    }

    fn address(&self) -> String {
        let mut rng = self.rng.lock();
        format!(
            "10.{}.{}.{}",
            rng.gen_range(0..=255u8),
            rng.gen_range(0..=255u8),
            rng.gen_range(1..=254u8)
        )
    }
}

/// Simulated node driver
#[derive(Debug, Clone)]
pub struct SimNode {
    backend: Arc<SimBackend>,
    kind: NodeKind,
}

impl SimNode {
    /// Create a driver of the given kind
    #[must_use]
    pub fn new(backend: Arc<SimBackend>, kind: NodeKind) -> Self {
        Self { backend, kind }
    }
}

impl NodeLifecycle for SimNode {
    fn create(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        self.backend.perform(ctx, Phase::Create, None)?;
        match self.kind {
            NodeKind::Compute => ctx.set_attribute("ip_address", self.backend.address()),
            NodeKind::Storage => ctx.set_attribute("volume_id", format!("vol-{}", ctx.id())),
            NodeKind::Network => {
                ctx.set_attribute("cidr", format!("{}/24", self.backend.address()));
            }
            NodeKind::Software => {}
        }
        Ok(())
    }

    fn configure(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        self.backend.perform(ctx, Phase::Configure, None)
    }

    fn start(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        self.backend.perform(ctx, Phase::Start, None)
    }

    fn stop(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        self.backend.perform(ctx, Phase::Stop, None)
    }

    fn delete(&self, ctx: &NodeContext<'_>) -> OperationResult<()> {
        self.backend.perform(ctx, Phase::Delete, None)?;
        for key in ["ip_address", "volume_id", "cidr"] {
            if ctx.attribute(key).is_some() {
                ctx.set_attribute(key, Value::Null);
            }
        }
        Ok(())
    }
}

/// Simulated relationship driver
#[derive(Debug, Clone)]
pub struct SimRelationship {
    backend: Arc<SimBackend>,
    kind: RelationshipKind,
}

impl SimRelationship {
    /// Create a driver of the given kind
    #[must_use]
    pub fn new(backend: Arc<SimBackend>, kind: RelationshipKind) -> Self {
        Self { backend, kind }
    }

    fn perform(&self, ctx: &RelationshipContext<'_>, phase: Phase) -> OperationResult<()> {
        let local = match ctx.side() {
            Endpoint::Source => ctx.source(),
            Endpoint::Target => ctx.target(),
        };
        let label = format!(
            "{}:{}->{}",
            ctx.relationship().relationship,
            ctx.source().name(),
            ctx.target().name()
        );
        self.backend.perform(&local, phase, Some(&label))
    }
}

/// Add `name` to the string array stored under `key`
fn push_peer(ctx: &NodeContext<'_>, key: &str, name: &str) {
    let mut peers = match ctx.attribute(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    if !peers.iter().any(|p| p.as_str() == Some(name)) {
        peers.push(Value::from(name));
    }
    ctx.set_attribute(key, Value::Array(peers));
}

/// Remove `name` from the string array stored under `key`
fn drop_peer(ctx: &NodeContext<'_>, key: &str, name: &str) {
    if let Some(Value::Array(mut peers)) = ctx.attribute(key) {
        peers.retain(|p| p.as_str() != Some(name));
        ctx.set_attribute(key, Value::Array(peers));
    }
}

impl RelationshipLifecycle for SimRelationship {
    fn pre_configure_source(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        self.perform(ctx, Phase::PreConfigureSource)?;
        if self.kind == RelationshipKind::HostedOn {
            if let Some(ip) = ctx.target().attribute("ip_address") {
                ctx.source().set_attribute("host_address", ip);
            }
        }
        Ok(())
    }

    fn pre_configure_target(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        self.perform(ctx, Phase::PreConfigureTarget)
    }

    fn post_configure_source(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        self.perform(ctx, Phase::PostConfigureSource)
    }

    fn post_configure_target(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        self.perform(ctx, Phase::PostConfigureTarget)
    }

    fn add_source(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        self.perform(ctx, Phase::AddSource)?;
        push_peer(&ctx.target(), "sources", ctx.source().name());
        Ok(())
    }

    fn add_target(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        self.perform(ctx, Phase::AddTarget)?;
        push_peer(&ctx.source(), "targets", ctx.target().name());
        Ok(())
    }

    fn remove_source(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        self.perform(ctx, Phase::RemoveSource)?;
        drop_peer(&ctx.target(), "sources", ctx.source().name());
        Ok(())
    }

    fn remove_target(&self, ctx: &RelationshipContext<'_>) -> OperationResult<()> {
        self.perform(ctx, Phase::RemoveTarget)?;
        drop_peer(&ctx.source(), "targets", ctx.target().name());
        Ok(())
    }
}
