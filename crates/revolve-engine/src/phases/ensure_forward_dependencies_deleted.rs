use async_trait::async_trait;
use revolve_domain::{Phase, ResourceEventType, ResourceState};

use crate::error::PhaseOutcome;
use crate::runner::{PhaseCtx, PhaseHandler};

/// Grounded on `transitions/tasks/ensure_forward_dependencies_deleted.py`:
/// before deleting a resource, every reverse-dependency (resource that
/// depends on this one) must already be `deleted`.
pub struct EnsureForwardDependenciesDeletedHandler;

#[async_trait]
impl PhaseHandler for EnsureForwardDependenciesDeletedHandler {
    fn phase(&self) -> Phase {
        Phase::EnsureForwardDependenciesDeleted
    }

    async fn run(&self, ctx: &mut PhaseCtx) -> PhaseOutcome {
        let dependencies = match ctx.store.list_dependencies().await {
            Ok(d) => d,
            Err(e) => return PhaseOutcome::retry(ResourceEventType::Error, e.to_string()),
        };
        let dependents: Vec<_> = dependencies
            .into_iter()
            .filter(|d| d.depends_on == ctx.resource.id)
            .collect();

        for dep in &dependents {
            let downstream = match ctx.store.get_resource(&dep.resource_id).await {
                Ok(Some(r)) => r,
                Ok(None) => continue,
                Err(e) => return PhaseOutcome::retry(ResourceEventType::Error, e.to_string()),
            };

            if downstream.state == ResourceState::Deleted {
                continue;
            }
            if matches!(
                downstream.state,
                ResourceState::DeletionTerminated | ResourceState::CreationTerminated
            ) {
                return PhaseOutcome::fail(ResourceEventType::DeletionTerminated, "deletion_terminated");
            }
            return PhaseOutcome::retry(ResourceEventType::DeletionRequested, "dependency_deletion_pending");
        }

        if let Err(e) = ctx
            .record_resource_event(ResourceEventType::DeletionRequested, Some("forward_dependencies_absent".to_string()))
            .await
        {
            return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
        }
        if let Err(e) = ctx.create_next_transition(Phase::EnsureDeleted).await {
            return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
        }
        PhaseOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointCache;
    use revolve_adapter::{AdapterRegistry, ResourceAdapter};
    use revolve_domain::{Health, ProjectId, Resource, ResourceDependency, Transition};
    use revolve_store::{InMemoryStore, Store};
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct NoopAdapter;

    #[async_trait]
    impl ResourceAdapter for NoopAdapter {
        fn kind(&self) -> &'static str {
            "vpc_network"
        }
        fn validate(&self, _c: &Value) -> Result<(), revolve_adapter::AdapterError> {
            Ok(())
        }
        async fn identify(&self, _r: &Resource) -> Result<Option<Value>, revolve_adapter::AdapterError> {
            Ok(None)
        }
        async fn list(&self, _p: &ProjectId) -> Result<Vec<Value>, revolve_adapter::AdapterError> {
            Ok(vec![])
        }
        async fn create(&self, _r: &Resource) -> Result<Value, revolve_adapter::AdapterError> {
            Ok(json!({}))
        }
        async fn delete(&self, _r: &Resource) -> Result<(), revolve_adapter::AdapterError> {
            Ok(())
        }
        async fn check_health(&self, _r: &Resource, _o: &Value) -> Result<Health, revolve_adapter::AdapterError> {
            Ok(Health::Healthy)
        }
    }

    fn ctx_for(store: Arc<InMemoryStore>, resource: Resource) -> PhaseCtx {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(NoopAdapter));
        let transition = Transition::new(resource.id.clone(), Phase::EnsureForwardDependenciesDeleted);
        PhaseCtx {
            store: store as Arc<dyn Store>,
            adapter: registry.get("vpc_network").unwrap(),
            checkpoints: Arc::new(CheckpointCache::default()),
            resource,
            transition,
            poll_delay: std::time::Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn dependent_still_present_retries() {
        let store = Arc::new(InMemoryStore::new());
        let upstream = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
        let downstream = Resource::new(ProjectId::new("p"), "firewall", "fw-b", json!({}));
        store.upsert_resource(&upstream).await.unwrap();
        store.upsert_resource(&downstream).await.unwrap();
        store
            .add_dependency(&ResourceDependency { resource_id: downstream.id.clone(), depends_on: upstream.id.clone() })
            .await
            .unwrap();
        let mut ctx = ctx_for(store, upstream);

        let outcome = EnsureForwardDependenciesDeletedHandler.run(&mut ctx).await;
        match outcome {
            PhaseOutcome::Retry { reason, .. } => assert_eq!(reason.as_deref(), Some("dependency_deletion_pending")),
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_dependents_deleted_advances() {
        let store = Arc::new(InMemoryStore::new());
        let upstream = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
        let mut downstream = Resource::new(ProjectId::new("p"), "firewall", "fw-b", json!({}));
        downstream.state = ResourceState::Deleted;
        store.upsert_resource(&upstream).await.unwrap();
        store.upsert_resource(&downstream).await.unwrap();
        store
            .add_dependency(&ResourceDependency { resource_id: downstream.id.clone(), depends_on: upstream.id.clone() })
            .await
            .unwrap();
        let mut ctx = ctx_for(store.clone(), upstream);

        let outcome = EnsureForwardDependenciesDeletedHandler.run(&mut ctx).await;
        assert!(matches!(outcome, PhaseOutcome::Success));
        let transitions = store.list_transitions(None).await.unwrap();
        assert!(transitions.iter().any(|t| t.phase == Phase::EnsureDeleted));
    }
}
