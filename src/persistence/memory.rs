//! In-process store backed by concurrent maps.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::breaker::CircuitActor;
use crate::persistence::{StateStore, StoreError};
use crate::remediation::WorkflowCheckpoint;

#[derive(Debug, Default)]
pub struct MemoryStore {
    circuits: DashMap<String, CircuitActor>,
    checkpoints: DashMap<String, WorkflowCheckpoint>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_circuit(&self, key: &str) -> Result<Option<CircuitActor>, StoreError> {
        Ok(self.circuits.get(key).map(|r| r.value().clone()))
    }

    async fn save_circuit(&self, actor: &CircuitActor) -> Result<(), StoreError> {
        self.circuits.insert(actor.key().to_string(), actor.clone());
        Ok(())
    }

    async fn remove_circuit(&self, key: &str) -> Result<(), StoreError> {
        self.circuits.remove(key);
        Ok(())
    }

    async fn list_circuits(&self) -> Result<Vec<CircuitActor>, StoreError> {
        Ok(self.circuits.iter().map(|r| r.value().clone()).collect())
    }

    async fn load_checkpoint(&self, execution_id: &str) -> Result<Option<WorkflowCheckpoint>, StoreError> {
        Ok(self.checkpoints.get(execution_id).map(|r| r.value().clone()))
    }

    async fn save_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> Result<(), StoreError> {
        self.checkpoints.insert(checkpoint.execution_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn list_checkpoints(&self) -> Result<Vec<WorkflowCheckpoint>, StoreError> {
        Ok(self.checkpoints.iter().map(|r| r.value().clone()).collect())
    }
}
