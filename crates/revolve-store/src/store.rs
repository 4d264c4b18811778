use async_trait::async_trait;
use revolve_domain::{
    Checkpoint, Resource, ResourceDependency, ResourceEvent, ResourceId, Transition,
    TransitionEvent, TransitionId,
};

use crate::error::StoreError;

/// Durable storage for resources, their dependency edges, transitions, and
/// the append-only event logs the engine projects state from.
///
/// Every write the engine performs goes through this trait, never a
/// sibling in-memory cache — `InMemoryStore` and `RedbStore` are the two
/// implementations, selected by whether the process needs state to
/// survive a restart.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get_resource(&self, id: &ResourceId) -> Result<Option<Resource>, StoreError>;
    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError>;
    async fn upsert_resource(&self, resource: &Resource) -> Result<(), StoreError>;
    async fn delete_resource(&self, id: &ResourceId) -> Result<(), StoreError>;

    async fn list_dependencies(&self) -> Result<Vec<ResourceDependency>, StoreError>;
    async fn add_dependency(&self, dependency: &ResourceDependency) -> Result<(), StoreError>;

    async fn append_resource_event(&self, event: &ResourceEvent) -> Result<(), StoreError>;
    async fn list_resource_events(
        &self,
        resource_id: Option<&ResourceId>,
        limit: u32,
    ) -> Result<Vec<ResourceEvent>, StoreError>;

    async fn get_transition(&self, id: &TransitionId) -> Result<Option<Transition>, StoreError>;
    async fn list_transitions(
        &self,
        resource_id: Option<&ResourceId>,
    ) -> Result<Vec<Transition>, StoreError>;
    async fn upsert_transition(&self, transition: &Transition) -> Result<(), StoreError>;

    async fn append_transition_event(&self, event: &TransitionEvent) -> Result<(), StoreError>;
    async fn list_transition_events(
        &self,
        transition_id: &TransitionId,
    ) -> Result<Vec<TransitionEvent>, StoreError>;

    async fn get_checkpoint(
        &self,
        transition_id: &TransitionId,
        step_name: &str,
    ) -> Result<Option<Checkpoint>, StoreError>;
    async fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;
}
