use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use node_selection::config::{load_config, SelectionConfig};
use node_selection::observability::logging;
use node_selection::selection::{HttpSyncStatusClient, ReplicaSelector, StaticRegistry};
use node_selection::ServiceSelector;

#[derive(Parser)]
#[command(name = "select-cli")]
#[command(about = "Probe candidate endpoints and run the selection engines", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Candidate endpoint; repeat for each candidate.
    #[arg(short, long = "endpoint", required = true)]
    endpoints: Vec<String>,

    /// Expected current version for versioned service classes.
    #[arg(long)]
    current_version: Option<String>,

    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Race a probing round and print the best endpoint
    Select,
    /// Probe every candidate and print the full healthy set
    FindAll,
    /// Assemble a primary and secondaries for replicated storage
    Replica {
        /// Total replica count (primary + secondaries).
        #[arg(short, long)]
        nodes: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SelectionConfig::default(),
    };

    let mut registry = StaticRegistry::new(cli.endpoints.clone());
    if let Some(raw) = &cli.current_version {
        registry = registry.with_current_version(semver::Version::parse(raw)?);
    }
    let registry = Arc::new(registry);

    match cli.command {
        Commands::Select => {
            let selector = ServiceSelector::new(registry, config.selector);
            let selected = selector.select().await;
            print_json(&json!({
                "selected": selected,
                "total_attempts": selector.total_attempts(),
                "unhealthy": selector.unhealthy_size(),
                "backups": selector.backups_size(),
                "decision_tree": selector.decision_trace(),
            }))?;
        }
        Commands::FindAll => {
            let selector = ServiceSelector::new(registry, config.selector);
            let healthy = selector.find_all().await;
            print_json(&json!({ "healthy": healthy }))?;
        }
        Commands::Replica { nodes } => {
            let count = nodes.unwrap_or(config.replica.replica_count);
            let selector = ReplicaSelector::new(
                registry,
                Arc::new(HttpSyncStatusClient::new()),
                config.replica,
            );
            let replica_set = selector.select(count).await;
            print_json(&json!({
                "primary": replica_set.primary,
                "secondaries": replica_set.secondaries,
                "probed": replica_set.probed.len(),
                "decision_tree": selector.decision_trace(),
            }))?;
        }
    }

    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
