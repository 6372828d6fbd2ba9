//! # Process State Persistence
//!
//! The orchestrator owns process-scoped blob storage; the store contract only
//! reads and writes serialized [`DeploymentProcessState`] by process id.
//!
//! ```rust
//! use mta_deployer::state_machine::{InMemoryProcessStateStore, ProcessStateStore};
//! use mta_deployer::test_helpers::process_state;
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryProcessStateStore::new();
//! store.save_state("process-1", &process_state("com.example.shop")).await.unwrap();
//!
//! let restored = store.load_state("process-1").await.unwrap().unwrap();
//! assert_eq!(restored.mta_id, "com.example.shop");
//! # });
//! ```

use super::process_state::DeploymentProcessState;
use crate::error::DeployResult;
use async_trait::async_trait;
use dashmap::DashMap;

/// Blob storage for process state, scoped by process instance id
#[async_trait]
pub trait ProcessStateStore: Send + Sync {
    async fn read(&self, process_id: &str) -> DeployResult<Option<Vec<u8>>>;

    async fn write(&self, process_id: &str, bytes: Vec<u8>) -> DeployResult<()>;

    async fn remove(&self, process_id: &str) -> DeployResult<()>;

    async fn load_state(&self, process_id: &str) -> DeployResult<Option<DeploymentProcessState>> {
        match self.read(process_id).await? {
            Some(bytes) => Ok(Some(DeploymentProcessState::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save_state(&self, process_id: &str, state: &DeploymentProcessState) -> DeployResult<()> {
        self.write(process_id, state.to_bytes()?).await
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProcessStateStore {
    states: DashMap<String, Vec<u8>>,
}

impl InMemoryProcessStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl ProcessStateStore for InMemoryProcessStateStore {
    async fn read(&self, process_id: &str) -> DeployResult<Option<Vec<u8>>> {
        Ok(self.states.get(process_id).map(|entry| entry.value().clone()))
    }

    async fn write(&self, process_id: &str, bytes: Vec<u8>) -> DeployResult<()> {
        self.states.insert(process_id.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, process_id: &str) -> DeployResult<()> {
        self.states.remove(process_id);
        Ok(())
    }
}
