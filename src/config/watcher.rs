//! Configuration file watcher for hot reload.
//!
//! Only the `[transfer]` section is applied live. Edits to any other section
//! are reported and ignored until the next restart.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use tokio::sync::mpsc;
use crate::config::loader::load_config;
use crate::config::schema::{TpcConfig, TransferConfig};

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: TpcConfig,
    update_tx: mpsc::UnboundedSender<TransferConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher seeded with the configuration already in use.
    ///
    /// Returns the watcher and a receiver for transfer-section updates.
    pub fn new(path: &Path, current: TpcConfig) -> (Self, mpsc::UnboundedReceiver<TransferConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            current,
            update_tx,
        }, update_rx)
    }

    /// Start watching the file in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let mut current = self.current;

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        match load_config(&path) {
                            Ok(new_config) => {
                                if let Some(transfer) = apply_reload(&mut current, new_config) {
                                    let _ = tx.send(transfer);
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Fold a freshly loaded file into `current`; returns the transfer section when it changed.
fn apply_reload(current: &mut TpcConfig, loaded: TpcConfig) -> Option<TransferConfig> {
    if loaded.listener.bind_address != current.listener.bind_address
        || loaded.listener.tls.is_some() != current.listener.tls.is_some()
        || loaded.storage.root != current.storage.root
        || loaded.observability.log_level != current.observability.log_level
    {
        tracing::warn!("Only [transfer] is reloaded live; other changes need a restart");
    }
    if loaded.transfer == current.transfer {
        tracing::debug!("Transfer settings unchanged");
        return None;
    }
    current.transfer = loaded.transfer.clone();
    Some(loaded.transfer)
}
