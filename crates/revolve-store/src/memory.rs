use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use revolve_domain::{
    Checkpoint, Resource, ResourceDependency, ResourceEvent, ResourceId, Transition,
    TransitionEvent, TransitionId,
};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, Default)]
struct Inner {
    resources: HashMap<ResourceId, Resource>,
    dependencies: Vec<ResourceDependency>,
    resource_events: Vec<ResourceEvent>,
    transitions: HashMap<TransitionId, Transition>,
    transition_events: Vec<TransitionEvent>,
    checkpoints: HashMap<(TransitionId, String), Checkpoint>,
}

/// In-memory implementation of [`Store`].
///
/// All data is lost on process exit. Used in tests and for `--store memory`
/// ad-hoc runs of the CLI.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_resource(&self, id: &ResourceId) -> Result<Option<Resource>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.resources.get(id).cloned())
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.resources.values().cloned().collect())
    }

    async fn upsert_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.resources.insert(resource.id.clone(), resource.clone());
        Ok(())
    }

    async fn delete_resource(&self, id: &ResourceId) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.resources.remove(id);
        Ok(())
    }

    async fn list_dependencies(&self) -> Result<Vec<ResourceDependency>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.dependencies.clone())
    }

    async fn add_dependency(&self, dependency: &ResourceDependency) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.dependencies.push(dependency.clone());
        Ok(())
    }

    async fn append_resource_event(&self, event: &ResourceEvent) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.resource_events.push(event.clone());
        Ok(())
    }

    async fn list_resource_events(
        &self,
        resource_id: Option<&ResourceId>,
        limit: u32,
    ) -> Result<Vec<ResourceEvent>, StoreError> {
        let guard = self.inner.read().await;
        let filtered: Vec<ResourceEvent> = guard
            .resource_events
            .iter()
            .filter(|ev| resource_id.map_or(true, |id| &ev.resource_id == id))
            .cloned()
            .collect();
        let start = filtered.len().saturating_sub(limit as usize);
        Ok(filtered[start..].to_vec())
    }

    async fn get_transition(&self, id: &TransitionId) -> Result<Option<Transition>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.transitions.get(id).cloned())
    }

    async fn list_transitions(
        &self,
        resource_id: Option<&ResourceId>,
    ) -> Result<Vec<Transition>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .transitions
            .values()
            .filter(|t| resource_id.map_or(true, |id| &t.resource_id == id))
            .cloned()
            .collect())
    }

    async fn upsert_transition(&self, transition: &Transition) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.transitions.insert(transition.id, transition.clone());
        Ok(())
    }

    async fn append_transition_event(&self, event: &TransitionEvent) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.transition_events.push(event.clone());
        Ok(())
    }

    async fn list_transition_events(
        &self,
        transition_id: &TransitionId,
    ) -> Result<Vec<TransitionEvent>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .transition_events
            .iter()
            .filter(|ev| &ev.transition_id == transition_id)
            .cloned()
            .collect())
    }

    async fn get_checkpoint(
        &self,
        transition_id: &TransitionId,
        step_name: &str,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.checkpoints.get(&(*transition_id, step_name.to_string())).cloned())
    }

    async fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.checkpoints.insert(
            (checkpoint.transition_id, checkpoint.step_name.clone()),
            checkpoint.clone(),
        );
        Ok(())
    }
}
