//! HTTP third-party copy service.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                     HTTP-TPC                      │
//!     COPY request        │  ┌─────────┐    ┌──────────────┐    ┌──────────┐ │
//!     ────────────────────┼─▶│  http   │───▶│ tpc          │───▶│ storage  │ │
//!                         │  │ server  │    │ orchestrator │    │ (local)  │ │
//!                         │  └─────────┘    └──────┬───────┘    └────▲─────┘ │
//!                         │                        │ TransferState   │       │
//!                         │                        ▼                 │       │
//!     201 / 307 / 4xx     │                 ┌──────────────┐  bridge │       │
//!     ◀───────────────────┼──               │ engine       │─────────┘       │
//!                         │                 │ (hyper)      │◀──────────────────┼──── Remote peer
//!                         │                 └──────────────┘                  │
//!                         │  config · observability · lifecycle · resilience │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use http_tpc::config::loader::load_config;
use http_tpc::config::validation::validate_config;
use http_tpc::config::TpcConfig;
use http_tpc::lifecycle::{signals, startup, Shutdown};
use http_tpc::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "http-tpc")]
#[command(about = "HTTP third-party copy server", long_about = None)]
struct Args {
    /// TOML configuration file; watched for [transfer] changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override storage.root.
    #[arg(short, long)]
    root: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => TpcConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if let Some(root) = args.root {
        config.storage.root = root;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("invalid configuration: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "http-tpc starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        storage_root = %config.storage.root,
        tls = config.listener.tls.is_some(),
        stall_retries = config.transfer.stall_retries,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    startup::run(config, args.config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
