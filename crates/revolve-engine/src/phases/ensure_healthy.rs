use async_trait::async_trait;
use revolve_domain::{Health, Phase, ResourceEventType};

use crate::error::PhaseOutcome;
use crate::runner::{PhaseCtx, PhaseHandler};

/// Grounded on `transitions/tasks/ensure_healthy.py`. The adapter's
/// `check_health` collapses the original's ordered list of
/// `health_check__*` predicates into one aggregate verdict (no adapter in
/// this crate needs per-check terminal/non-terminal distinction), so an
/// `Unhealthy` verdict is always treated as retryable until the phase's
/// retry budget is exhausted, at which point `health_checks_terminated` is
/// emitted as the exhaustion side effect.
pub struct EnsureHealthyHandler;

#[async_trait]
impl PhaseHandler for EnsureHealthyHandler {
    fn phase(&self) -> Phase {
        Phase::EnsureHealthy
    }

    async fn run(&self, ctx: &mut PhaseCtx) -> PhaseOutcome {
        let observed = match ctx.adapter.identify(&ctx.resource).await {
            Ok(Some(v)) => v,
            Ok(None) => {
                return PhaseOutcome::retry_with_exhaustion(
                    ResourceEventType::HealthCheckFailed,
                    "health_check_failed",
                    ResourceEventType::HealthChecksTerminated,
                )
            }
            Err(e) => return e.into(),
        };

        let health = match ctx.adapter.check_health(&ctx.resource, &observed).await {
            Ok(h) => h,
            Err(e) => return e.into(),
        };

        match health {
            Health::Healthy => {
                if let Err(e) = ctx
                    .record_resource_event(ResourceEventType::HealthChecksSucceeded, None)
                    .await
                {
                    return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
                }
                PhaseOutcome::Success
            }
            Health::Unhealthy | Health::Unknown => PhaseOutcome::retry_with_exhaustion(
                ResourceEventType::HealthCheckFailed,
                "health_check_failed",
                ResourceEventType::HealthChecksTerminated,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointCache;
    use revolve_adapter::ResourceAdapter;
    use revolve_domain::{ProjectId, Resource, Transition};
    use revolve_store::{InMemoryStore, Store};
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct FixedHealth(Health);

    #[async_trait]
    impl ResourceAdapter for FixedHealth {
        fn kind(&self) -> &'static str {
            "vpc_network"
        }
        fn validate(&self, _c: &Value) -> Result<(), revolve_adapter::AdapterError> {
            Ok(())
        }
        async fn identify(&self, _r: &Resource) -> Result<Option<Value>, revolve_adapter::AdapterError> {
            Ok(Some(json!({})))
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
            Ok(self.0)
        }
    }

    fn ctx_with(store: Arc<InMemoryStore>, adapter: Arc<dyn ResourceAdapter>, resource: Resource, transition: Transition) -> PhaseCtx {
        PhaseCtx {
            store: store as Arc<dyn Store>,
            adapter,
            checkpoints: Arc::new(CheckpointCache::default()),
            resource,
            transition,
            poll_delay: std::time::Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn healthy_result_succeeds_and_updates_health() {
        let store = Arc::new(InMemoryStore::new());
        let resource = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
        store.upsert_resource(&resource).await.unwrap();
        let transition = Transition::new(resource.id.clone(), Phase::EnsureHealthy);
        let mut ctx = ctx_with(store, Arc::new(FixedHealth(Health::Healthy)), resource, transition);

        let outcome = EnsureHealthyHandler.run(&mut ctx).await;
        assert!(matches!(outcome, PhaseOutcome::Success));
        assert_eq!(ctx.resource.health, Health::Healthy);
    }

    #[tokio::test]
    async fn unhealthy_result_retries_with_exhaustion_side_effect() {
        let store = Arc::new(InMemoryStore::new());
        let resource = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
        store.upsert_resource(&resource).await.unwrap();
        let transition = Transition::new(resource.id.clone(), Phase::EnsureHealthy);
        let mut ctx = ctx_with(store, Arc::new(FixedHealth(Health::Unhealthy)), resource, transition);

        let outcome = EnsureHealthyHandler.run(&mut ctx).await;
        match outcome {
            PhaseOutcome::Retry { event_type, exhausted_side_effect, .. } => {
                assert_eq!(event_type, ResourceEventType::HealthCheckFailed);
                assert_eq!(exhausted_side_effect, Some(ResourceEventType::HealthChecksTerminated));
            }
            other => panic!("expected retry, got {other:?}"),
        }
    }
}
