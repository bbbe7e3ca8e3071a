//! Configuration file watcher for live tunables.
//!
//! Only `breaker.failure_threshold` takes effect on reload; window spans are
//! captured when an actor is constructed and listener/persistence settings
//! need a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use crate::config::loader::load_config;
use crate::config::schema::BreakerConfig;

/// Watches the configuration file and publishes validated reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<BreakerConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<BreakerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(new_config) => {
                            tracing::info!(
                                failure_threshold = new_config.breaker.failure_threshold,
                                "Config file changed, publishing reload"
                            );
                            let _ = tx.send(new_config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current settings");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
