use crate::error::StateStoreError;
use async_trait::async_trait;

pub mod models;
pub mod yaml_store;

pub use models::{ResumeState, TaskPhase, TaskRecord};
pub use yaml_store::YamlStateStore;

/// Persists the resume state of a partially failed transfer.
#[async_trait]
pub trait ResumeStateStore: Send + Sync {
    async fn save(&self, state: &ResumeState) -> Result<(), StateStoreError>;

    /// Missing or empty state gives `None`.
    async fn load(&self) -> Result<Option<ResumeState>, StateStoreError>;

    /// Deleting a state that does not exist is not an error.
    async fn delete(&self) -> Result<(), StateStoreError>;
}
