//! hostfleet — operator CLI for the capacity engine.
//!
//! Runs capacity summaries, admission checks, and node selection against
//! a fleet snapshot file: a JSON document with the panel's node and
//! workload inventory. Useful for dry-running placement decisions and for
//! inspecting what the engine would do with the current fleet.
//!
//! # Usage
//!
//! ```text
//! hostfleet --fleet fleet.json summary
//! hostfleet --fleet fleet.json check --location 1 --memory 2048 --disk 10240
//! hostfleet --fleet fleet.json select --location 1 --memory 2048 --disk 10240
//! ```

mod config;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use hostfleet_capacity::CapacityEngine;
use hostfleet_panel::{NodeDescriptor, StaticSource, WorkloadDescriptor};
use hostfleet_placement::ResourceRequirement;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "hostfleet", about = "Capacity monitoring and node placement")]
struct Cli {
    /// Fleet snapshot file: JSON with "nodes" and "servers" arrays.
    #[arg(long, global = true, default_value = "fleet.json")]
    fleet: PathBuf,

    /// Optional TOML config for cache windows and scoring tunables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Location summaries, or fleet-wide stats when no location is given.
    Summary {
        #[arg(long)]
        location: Option<u32>,
    },
    /// Check whether a location can accommodate a requirement.
    Check {
        #[arg(long)]
        location: u32,
        /// Required memory in MB.
        #[arg(long)]
        memory: u64,
        /// Required disk in MB.
        #[arg(long)]
        disk: u64,
        /// Optional CPU hint.
        #[arg(long)]
        cpu: Option<u32>,
    },
    /// Pick the optimal node for a requirement.
    Select {
        #[arg(long)]
        location: u32,
        /// Required memory in MB.
        #[arg(long)]
        memory: u64,
        /// Required disk in MB.
        #[arg(long)]
        disk: u64,
        /// Optional CPU hint.
        #[arg(long)]
        cpu: Option<u32>,
    },
}

/// On-disk fleet inventory consumed by the static panel source.
#[derive(Debug, Deserialize)]
struct FleetSnapshot {
    nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    servers: Vec<WorkloadDescriptor>,
}

impl FleetSnapshot {
    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading fleet snapshot {}", path.display()))?;
        let snapshot: FleetSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("parsing fleet snapshot {}", path.display()))?;
        Ok(snapshot)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hostfleet=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let snapshot = FleetSnapshot::from_file(&cli.fleet)?;
    info!(
        nodes = snapshot.nodes.len(),
        servers = snapshot.servers.len(),
        "fleet snapshot loaded"
    );
    let source = StaticSource::new(snapshot.nodes, snapshot.servers);

    let config = match &cli.config {
        Some(path) => CliConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CliConfig::default(),
    };

    let engine = CapacityEngine::new(source)
        .with_cache_config(config.cache_config())
        .with_scoring(config.scoring_config());

    match cli.command {
        Command::Summary { location: Some(id) } => {
            match engine.location_summary(id, false).await {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => anyhow::bail!("location {id} is unknown in this snapshot"),
            }
        }
        Command::Summary { location: None } => {
            let stats = engine.fleet_stats(false).await;
            let locations = engine.all_location_summaries(false).await;
            let report = serde_json::json!({ "fleet": stats, "locations": locations });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Check {
            location,
            memory,
            disk,
            cpu,
        } => {
            let requirement = ResourceRequirement {
                memory_mb: memory,
                disk_mb: disk,
                cpu,
            };
            let result = engine.check_capacity(location, &requirement, false).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Select {
            location,
            memory,
            disk,
            cpu,
        } => {
            let requirement = ResourceRequirement {
                memory_mb: memory,
                disk_mb: disk,
                cpu,
            };
            let result = engine.select_node(location, &requirement, false).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
