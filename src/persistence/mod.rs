//! Durable state for circuits and remediation workflows.
//!
//! # Data Flow
//! ```text
//! ActorDirectory ──save_circuit──▶ StateStore ◀──save_checkpoint── RemediationOrchestrator
//!        ▲                              │
//!        └──── load / list on hydrate ──┘
//! ```
//!
//! # Design Decisions
//! - One snapshot per circuit, written whole after every mutating operation
//! - Writes are atomic per record; a reader never sees half an operation
//! - The store is the source of truth for listings; memory is a cache

pub mod file;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::breaker::CircuitActor;
use crate::config::{PersistenceConfig, StoreBackend};
use crate::remediation::WorkflowCheckpoint;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Backend refused or could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence adapter for crash recovery.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_circuit(&self, key: &str) -> Result<Option<CircuitActor>, StoreError>;

    async fn save_circuit(&self, actor: &CircuitActor) -> Result<(), StoreError>;

    async fn remove_circuit(&self, key: &str) -> Result<(), StoreError>;

    async fn list_circuits(&self) -> Result<Vec<CircuitActor>, StoreError>;

    async fn load_checkpoint(&self, execution_id: &str) -> Result<Option<WorkflowCheckpoint>, StoreError>;

    async fn save_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> Result<(), StoreError>;

    async fn list_checkpoints(&self) -> Result<Vec<WorkflowCheckpoint>, StoreError>;
}

/// Build the configured store backend.
pub async fn open_store(config: &PersistenceConfig) -> Result<Arc<dyn StateStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory state store; circuits will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            let store = FileStore::open(PathBuf::from(&config.data_dir)).await?;
            tracing::info!(data_dir = %config.data_dir, "File state store opened");
            Ok(Arc::new(store))
        }
    }
}
