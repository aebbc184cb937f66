//! Startup orchestration.
//!
//! # Responsibilities
//! - Check the storage root and build the copy service
//! - Start background tasks (metrics, config watcher)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::config::loader::ConfigError;
use crate::config::watcher::ConfigWatcher;
use crate::config::{TpcConfig, TransferConfig};
use crate::engine::HyperEngine;
use crate::http::HttpServer;
use crate::net::tls::load_tls_config;
use crate::observability::metrics;
use crate::storage::LocalFileSystem;
use crate::tpc::CopyService;

use super::shutdown::Shutdown;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage root {path}: {source}")]
    StorageRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage root {0} is not a directory")]
    NotADirectory(String),

    #[error("Invalid address {0:?}")]
    Address(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error("Config watcher failed: {0}")]
    Watcher(#[from] notify::Error),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the copy service over the configured storage root and a hyper engine on `runtime`.
pub fn build_service(
    config: &TpcConfig,
    runtime: Handle,
) -> Result<(CopyService, Arc<ArcSwap<TransferConfig>>), StartupError> {
    let root = Path::new(&config.storage.root);
    let metadata = std::fs::metadata(root).map_err(|source| StartupError::StorageRoot {
        path: config.storage.root.clone(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(StartupError::NotADirectory(config.storage.root.clone()));
    }

    let transfer = Arc::new(ArcSwap::from_pointee(config.transfer.clone()));
    let service = CopyService::new(
        Arc::new(LocalFileSystem::new(root)),
        Arc::new(HyperEngine::new(runtime)),
        Arc::clone(&transfer),
    );
    tracing::info!(root = %root.display(), "Storage ready");
    Ok((service, transfer))
}

/// Start every subsystem and serve until `shutdown` fires.
pub async fn run(config: TpcConfig, config_path: Option<PathBuf>, shutdown: Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = parse_addr(&config.observability.metrics_address)?;
        metrics::init_metrics(addr);
    }

    let (service, transfer) = build_service(&config, Handle::current())?;

    // The watcher must stay alive for as long as the server runs.
    let (_watcher, config_updates) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path, config.clone());
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let addr = parse_addr(&config.listener.bind_address)?;
    let tls = config.listener.tls.clone();
    let server = HttpServer::new(config, service, transfer);

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path))
                .await
                .map_err(StartupError::Tls)?;
            server
                .run_tls(addr, rustls, config_updates, shutdown.subscribe())
                .await
                .map_err(StartupError::Serve)
        }
        None => {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| StartupError::Bind { addr, source })?;
            tracing::info!(address = %addr, "Listening for connections");
            server
                .run(listener, config_updates, shutdown.subscribe())
                .await
                .map_err(StartupError::Serve)
        }
    }
}

fn parse_addr(value: &str) -> Result<SocketAddr, StartupError> {
    value
        .parse()
        .map_err(|_| StartupError::Address(value.to_string()))
}
