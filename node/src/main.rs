//! RateDesk Node Binary
//!
//! Runs the rate service and streams live rates to the log.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratedesk_node::config::parse_pair;
use ratedesk_node::{Node, NodeConfig};

/// RateDesk node CLI
#[derive(Parser, Debug)]
#[command(name = "ratedesk-node")]
#[command(about = "FX rate quoting, caching and locking node")]
struct Args {
    /// Random seed for reproducible drift
    #[arg(long)]
    seed: Option<u64>,

    /// Corridor table (JSON)
    #[arg(long)]
    corridors: Option<PathBuf>,

    /// Pairs to stream, e.g. SGD/PHP,USD/SGD
    #[arg(long, value_delimiter = ',', value_parser = parse_pair)]
    pairs: Vec<ratedesk_common::CurrencyPair>,

    /// Stream interval in milliseconds
    #[arg(long)]
    interval_ms: Option<i64>,

    /// Run duration in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0")]
    duration: u64,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration, CLI overrides environment
    let mut config = NodeConfig::from_env();
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.corridors.is_some() {
        config.corridors_path = args.corridors.clone();
    }
    if !args.pairs.is_empty() {
        config.stream_pairs = args.pairs.clone();
    }
    config.json_logs |= args.json;

    init_logging(config.json_logs);

    info!("Starting RateDesk node");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let node_id = config
        .node_id
        .clone()
        .unwrap_or_else(|| format!("ratedesk-{}", uuid::Uuid::new_v4()));
    info!(node_id = %node_id, seed = ?config.seed, "Node ID assigned");

    let pairs = config.stream_pairs.clone();
    let node = Node::new(config, node_id)?;
    node.start().await?;

    let interval = args.interval_ms.map(chrono::Duration::milliseconds);
    node.spawn_stream(pairs, interval);

    if args.duration > 0 {
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(args.duration)) => {
                info!("Run duration elapsed");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
            }
        }
    } else {
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
    }

    node.stop().await;

    info!("Node shutdown complete");
    Ok(())
}
