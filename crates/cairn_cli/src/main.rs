//! CAIRN CLI
//!
//! Validate, preview and run deployment topologies against simulated
//! drivers.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use commands::{ScaleStep, SimArgs};
use logging::LogFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(about = "CAIRN - deployment topology lifecycle orchestrator", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a topology description
    Validate {
        /// Topology description (JSON)
        topology: PathBuf,
    },
    /// Print the wired task graph without running it
    Plan {
        /// Topology description (JSON)
        topology: PathBuf,
        /// Plan the uninstall instead of the install
        #[arg(long)]
        uninstall: bool,
    },
    /// Install a topology and print its snapshot
    Install {
        /// Topology description (JSON)
        topology: PathBuf,
        #[command(flatten)]
        sim: SimArgs,
    },
    /// Install, apply scale steps in order, optionally uninstall
    Run {
        /// Topology description (JSON)
        topology: PathBuf,
        /// Scale step NODE=COUNT, repeatable
        #[arg(long = "scale")]
        scale: Vec<ScaleStep>,
        /// Uninstall everything at the end
        #[arg(long)]
        uninstall: bool,
        #[command(flatten)]
        sim: SimArgs,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.log_format)?;

    let mut out = std::io::stdout().lock();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { topology } => commands::validate(&topology, &mut out),
        Commands::Plan {
            topology,
            uninstall,
        } => commands::plan(&topology, uninstall, &config, &mut out),
        Commands::Install { topology, sim } => {
            commands::run(&topology, &[], false, &sim, config, &mut out)
        }
        Commands::Run {
            topology,
            scale,
            uninstall,
            sim,
        } => commands::run(&topology, &scale, uninstall, &sim, config, &mut out),
    }
}
