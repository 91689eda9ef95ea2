//! Subcommand implementations.
//!
//! Every command writes its result to `out`; logs go to stderr.

use cairn_deploy::{CairnConfig, Deployment};
use cairn_sim::{FailureRule, SimEnvironment, SimSeed};
use cairn_topology::{Topology, TopologyDescription, Validator};
use cairn_workflow::{WorkflowKind, WorkflowPlan};
use clap::Args;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, bail};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Simulation options shared by `install` and `run`
#[derive(Debug, Clone, Args)]
pub struct SimArgs {
    /// Inject a failure: TARGET.PHASE or TARGET.PHASE!panic, repeatable
    #[arg(long = "fail")]
    pub fail: Vec<FailureRule>,
    /// Write the checkpoint log as JSON lines
    #[arg(long)]
    pub checkpoints: Option<PathBuf>,
    /// Write the operation journal as JSON lines
    #[arg(long)]
    pub journal: Option<PathBuf>,
    /// Simulated latency per operation, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub latency_ms: u64,
    /// Seed for latency jitter and generated attributes
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Worker threads, overriding the configuration file
    #[arg(long)]
    pub workers: Option<usize>,
}

impl SimArgs {
    fn environment(&self) -> SimEnvironment {
        let base = Duration::from_millis(self.latency_ms);
        let env = SimEnvironment::new()
            .with_seed(SimSeed::from_literal(self.seed))
            .with_latency(base, base / 2);
        let failures = env.failures();
        for rule in &self.fail {
            failures.add(rule.clone());
        }
        env
    }
}

impl Default for SimArgs {
    fn default() -> Self {
        Self {
            fail: Vec::new(),
            checkpoints: None,
            journal: None,
            latency_ms: 0,
            seed: 42,
            workers: None,
        }
    }
}

/// One `--scale NODE=COUNT` step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleStep {
    pub node: String,
    pub count: u32,
}

impl FromStr for ScaleStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (node, count) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NODE=COUNT, got {s:?}"))?;
        let count = count
            .parse()
            .map_err(|_| format!("invalid count in {s:?}"))?;
        if node.is_empty() {
            return Err(format!("missing node name in {s:?}"));
        }
        Ok(Self {
            node: node.to_string(),
            count,
        })
    }
}

/// Load the configuration file, or defaults
pub fn load_config(path: Option<&Path>) -> Result<CairnConfig> {
    match path {
        Some(path) => CairnConfig::load(path)
            .wrap_err_with(|| format!("failed to load config {}", path.display())),
        None => Ok(CairnConfig::default()),
    }
}

fn load_topology(path: &Path) -> Result<TopologyDescription> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    Ok(TopologyDescription::from_json(&text)?)
}

/// `cairn validate`
pub fn validate(path: &Path, out: &mut dyn Write) -> Result<()> {
    let desc = load_topology(path)?;
    let registry = SimEnvironment::new().registry();
    if let Err(errors) = Validator::new(&registry).validate(&desc) {
        for err in &errors {
            writeln!(out, "error: {err}")?;
        }
        bail!("{} is invalid: {} error(s)", path.display(), errors.len());
    }

    let topology = Topology::from_description(&desc, &registry)?;
    writeln!(
        out,
        "{}: {} nodes, {} relationships, {} instances, {} relationship instances",
        desc.name,
        desc.nodes.len(),
        desc.relationships.len(),
        topology.instance_count(),
        topology.relationship_count()
    )?;
    Ok(())
}

/// `cairn plan`
pub fn plan(path: &Path, uninstall: bool, config: &CairnConfig, out: &mut dyn Write) -> Result<()> {
    let desc = load_topology(path)?;
    let topology = Topology::from_description(&desc, &SimEnvironment::new().registry())?;
    let kind = if uninstall {
        WorkflowKind::Uninstall
    } else {
        WorkflowKind::Install
    };
    let plan = WorkflowPlan::build(
        &topology,
        kind,
        &topology.instance_ids(),
        &topology.relationship_ids(),
    )?;
    info!(
        kind = %kind,
        workers = config.engine.worker_threads,
        tasks = plan.graph().len(),
        "plan built"
    );
    write!(out, "{plan}")?;
    Ok(())
}

/// `cairn install` and `cairn run`
///
/// Checkpoint and journal files are written even when a step fails.
pub fn run(
    path: &Path,
    steps: &[ScaleStep],
    uninstall: bool,
    sim: &SimArgs,
    mut config: CairnConfig,
    out: &mut dyn Write,
) -> Result<()> {
    let desc = load_topology(path)?;
    if let Some(workers) = sim.workers {
        config.engine = config.engine.with_worker_threads(workers);
    }
    let env = sim.environment();
    let mut deployment = Deployment::from_description(&desc, &env.registry(), &config)?;

    let outcome = drive(&mut deployment, steps, uninstall, out);

    if let Some(path) = &sim.checkpoints {
        deployment
            .checkpoints()
            .write_json_lines(path)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    }
    if let Some(path) = &sim.journal {
        std::fs::write(path, env.journal().to_json_lines()?)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    }
    outcome
}

fn drive(
    deployment: &mut Deployment,
    steps: &[ScaleStep],
    uninstall: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let execution = deployment.install()?;
    deployment.wait(&execution)?;
    let (instances, relationships) = {
        let topology = deployment.topology();
        (topology.instance_count(), topology.relationship_count())
    };
    writeln!(out, "installed {instances} instances, {relationships} relationship instances")?;

    for step in steps {
        let report = deployment
            .scale(&step.node, step.count)
            .wrap_err_with(|| format!("scale {}={} failed", step.node, step.count))?;
        writeln!(out, "{}", serde_json::to_string(&report)?)?;
    }

    if uninstall {
        let execution = deployment.uninstall()?;
        deployment.wait(&execution)?;
        writeln!(out, "uninstalled")?;
    }

    writeln!(out, "{}", serde_json::to_string_pretty(&deployment.snapshot())?)?;
    Ok(())
}
