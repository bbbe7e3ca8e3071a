//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the state store
//! - Build the remediation pipeline and the actor directory
//! - Recover persisted circuits before any traffic is accepted
//! - Start background tasks (executor, sweeper, config reload)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::breaker::{ActorDirectory, BreakerError, Clock, SystemClock};
use crate::config::watcher::ConfigWatcher;
use crate::config::BreakerConfig;
use crate::lifecycle::Shutdown;
use crate::persistence::{open_store, StateStore, StoreError};
use crate::remediation::{
    remediation_queue, ActionError, HttpStopAction, RemediationAction, RemediationExecutor,
    RemediationOrchestrator,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to open state store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to build remediation action: {0}")]
    Action(#[from] ActionError),

    #[error("Failed to recover circuits: {0}")]
    Recover(#[from] BreakerError),

    #[error("Failed to watch config file: {0}")]
    Watcher(#[from] notify::Error),
}

/// Everything a running service holds on to.
pub struct Services {
    pub directory: Arc<ActorDirectory>,
    pub store: Arc<dyn StateStore>,
    tasks: Vec<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

impl Services {
    /// Wait for the background tasks after shutdown has been triggered.
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Build and start every subsystem.
///
/// `action` replaces the configured HTTP stop action when given. With a
/// `config_path` the file is watched and threshold changes are applied live.
pub async fn start(
    config: &BreakerConfig,
    config_path: Option<&Path>,
    action: Option<Arc<dyn RemediationAction>>,
    shutdown: &Shutdown,
) -> Result<Services, StartupError> {
    let store = open_store(&config.persistence).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let call_timeout = Duration::from_secs(config.remediation.timeout_secs);

    let action: Arc<dyn RemediationAction> = match action {
        Some(action) => action,
        None => Arc::new(HttpStopAction::new(&config.control_plane, call_timeout)?),
    };
    let orchestrator = Arc::new(RemediationOrchestrator::new(
        action,
        store.clone(),
        clock.clone(),
        call_timeout,
    ));

    let (dispatcher, rx) = remediation_queue(store.clone(), clock.clone());
    let executor = RemediationExecutor::new(orchestrator, store.clone(), rx, config.remediation.clone());

    let directory = Arc::new(ActorDirectory::new(
        config.breaker.clone(),
        store.clone(),
        dispatcher,
        clock,
    ));

    // Executor first so re-submitted outboxes have a consumer.
    let mut tasks = vec![tokio::spawn(executor.run(shutdown.subscribe()))];
    directory.recover().await?;
    tasks.push(tokio::spawn(directory.clone().run_sweeper(shutdown.subscribe())));

    let watcher = match config_path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let directory = directory.clone();
            let mut stop = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        update = updates.recv() => match update {
                            Some(new_config) => directory.update_settings(new_config.breaker),
                            None => break,
                        },
                        _ = stop.recv() => break,
                    }
                }
            }));
            Some(watcher)
        }
        None => None,
    };

    tracing::info!(
        window_size = ?config.breaker.window_size,
        failure_threshold = config.breaker.failure_threshold,
        backend = ?config.persistence.backend,
        "Breaker services started"
    );

    Ok(Services {
        directory,
        store,
        tasks,
        _watcher: watcher,
    })
}
