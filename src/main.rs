//! Order sync - incremental POS order to invoice transaction sync
//!
//! One invocation syncs every configured store once and exits.
//!
//! Module structure:
//! - `domain/` - Order source and destination record types
//! - `io/` - External interfaces (order source, transaction store, report channels)
//! - `services/` - Sync engine (fetch, classify, resolve, build, watermark)
//! - `infra/` - Infrastructure (Config, Metrics, Errors)

use anyhow::Context;
use clap::Parser;
use order_sync::infra::{Config, SyncMetrics};
use order_sync::io::{FileStore, JsonlPublisher, SquareClient};
use order_sync::services::SyncEngine;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Order sync - POS orders into invoice transactions
#[derive(Parser, Debug)]
#[command(name = "order-sync", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    // RUST_LOG overrides the default INFO level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    info!(version = %env!("CARGO_PKG_VERSION"), git_hash = %env!("GIT_HASH"), "order_sync_starting");

    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        source = %config.source_base_url(),
        data_dir = %config.data_dir(),
        categories = %config.categories().len(),
        channels = %config.channels().len(),
        skipped_customers = %config.skipped_customers().len(),
        print_reference = %config.print_reference().unwrap_or("-"),
        "config_loaded"
    );

    let store = FileStore::open(config.data_dir())
        .with_context(|| format!("Failed to open transaction store at {}", config.data_dir()))?;
    let source = SquareClient::new(&config).context("Failed to build order source client")?;
    let publisher = JsonlPublisher::new(config.channels());
    let metrics = Arc::new(SyncMetrics::new());

    let engine = SyncEngine::new(
        Arc::new(source),
        Arc::new(store),
        Arc::new(publisher),
        config.sync_rules(),
        metrics,
    );

    let summary = engine.run().await?;
    summary.log();

    info!("order_sync_complete");
    Ok(())
}
