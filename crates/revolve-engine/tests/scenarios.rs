use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use revolve_adapter::{AdapterError, AdapterRegistry, ResourceAdapter};
use revolve_domain::{
    DesiredState, Health, Phase, ProjectId, Resource, ResourceDependency, ResourceState,
    Transition, TransitionStatus,
};
use revolve_engine::{register_builtin_handlers, TaskRunner};
use revolve_store::{InMemoryStore, Store};
use serde_json::{json, Value};

/// A scripted adapter: `identify` reports absent until `exists_after_calls`
/// identify() calls have been made, then reports present; health is fixed.
struct ScriptedAdapter {
    kind: &'static str,
    exists_after_calls: usize,
    calls: AtomicUsize,
    health: Health,
    fail_create: bool,
}

impl ScriptedAdapter {
    fn new(kind: &'static str) -> Self {
        ScriptedAdapter {
            kind,
            exists_after_calls: 0,
            calls: AtomicUsize::new(0),
            health: Health::Healthy,
            fail_create: false,
        }
    }
}

#[async_trait]
impl ResourceAdapter for ScriptedAdapter {
    fn kind(&self) -> &'static str {
        self.kind
    }
    fn validate(&self, _config: &Value) -> Result<(), AdapterError> {
        Ok(())
    }
    async fn identify(&self, _resource: &Resource) -> Result<Option<Value>, AdapterError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.exists_after_calls {
            Ok(Some(json!({"selfLink": "x"})))
        } else {
            Ok(None)
        }
    }
    async fn list(&self, _project_id: &ProjectId) -> Result<Vec<Value>, AdapterError> {
        Ok(vec![])
    }
    async fn create(&self, _resource: &Resource) -> Result<Value, AdapterError> {
        if self.fail_create {
            Err(AdapterError::CreationFailed("simulated creation failure".to_string()))
        } else {
            Ok(json!({}))
        }
    }
    async fn delete(&self, _resource: &Resource) -> Result<(), AdapterError> {
        Ok(())
    }
    async fn check_health(&self, _resource: &Resource, _observed: &Value) -> Result<Health, AdapterError> {
        Ok(self.health)
    }
}

fn runner(store: Arc<dyn Store>, registry: AdapterRegistry) -> TaskRunner {
    let mut runner = TaskRunner::new(store, registry, Default::default()).with_poll_delay(Duration::from_millis(1));
    register_builtin_handlers(&mut runner);
    runner
}

/// Drives `transition_id` forward until its status is terminal or `max_steps`
/// attempts have run, mimicking repeated `submit_transition_tasks` passes.
async fn drive_to_terminal(store: &dyn Store, runner: &TaskRunner, mut transition_id: revolve_domain::TransitionId, max_steps: usize) {
    for _ in 0..max_steps {
        let transition = store.get_transition(&transition_id).await.unwrap().unwrap();
        if transition.status.is_terminal() {
            return;
        }
        runner.execute_attempt(transition_id, false).await.unwrap();

        let latest_for_resource = store.list_transitions(Some(&transition.resource_id)).await.unwrap();
        if let Some(next) = latest_for_resource
            .iter()
            .filter(|t| t.id != transition_id && t.created_at >= transition.created_at)
            .max_by_key(|t| t.created_at)
        {
            transition_id = next.id;
        }
    }
}

/// Scenario: a leaf resource (no dependencies) with a cooperative adapter
/// should reach `healthy` after ensure_exists -> ensure_healthy.
#[tokio::test]
async fn leaf_resource_happy_path_reaches_healthy() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let mut resource = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
    resource.desired_state = DesiredState::Healthy;
    store.upsert_resource(&resource).await.unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(ScriptedAdapter::new("vpc_network")));
    let runner = runner(store.clone(), registry);

    let transition = Transition::new(resource.id.clone(), Phase::EnsureExists);
    store.upsert_transition(&transition).await.unwrap();

    drive_to_terminal(&*store, &runner, transition.id, 10).await;

    let final_resource = store.get_resource(&resource.id).await.unwrap().unwrap();
    assert_eq!(final_resource.state, ResourceState::Healthy);
}

/// Scenario: a dependent resource must wait for its dependency to become
/// healthy before ensure_dependencies_ready lets it proceed.
#[tokio::test]
async fn dependent_resource_waits_for_dependency_gating() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let upstream = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
    let downstream = Resource::new(ProjectId::new("p"), "firewall", "fw-a", json!({}));
    store.upsert_resource(&upstream).await.unwrap();
    store.upsert_resource(&downstream).await.unwrap();
    store
        .add_dependency(&ResourceDependency { resource_id: downstream.id.clone(), depends_on: upstream.id.clone() })
        .await
        .unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(ScriptedAdapter::new("vpc_network")));
    registry.register(Arc::new(ScriptedAdapter::new("firewall")));
    let runner = runner(store.clone(), registry);

    let gating_transition = Transition::new(downstream.id.clone(), Phase::EnsureDependenciesReady);
    store.upsert_transition(&gating_transition).await.unwrap();

    runner.execute_attempt(gating_transition.id, false).await.unwrap();
    let stored = store.get_transition(&gating_transition.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransitionStatus::InProgress);
    assert_eq!(stored.attempt, 1, "should have retried once, waiting on upstream");

    let mut healthy_upstream = upstream.clone();
    healthy_upstream.state = ResourceState::Healthy;
    store.upsert_resource(&healthy_upstream).await.unwrap();

    runner.execute_attempt(gating_transition.id, false).await.unwrap();
    let stored = store.get_transition(&gating_transition.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransitionStatus::Succeeded);

    let next = store
        .list_transitions(Some(&downstream.id))
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.phase == Phase::EnsureExists)
        .expect("ensure_exists transition should have been created");
    assert_eq!(next.previous_transition, Some(gating_transition.id));
}

/// Scenario: a transient creation failure retries and eventually succeeds
/// once the adapter starts cooperating.
#[tokio::test]
async fn creation_retry_recovers_after_transient_failure() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let resource = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
    store.upsert_resource(&resource).await.unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(ScriptedAdapter { fail_create: true, ..ScriptedAdapter::new("vpc_network") }));
    let runner = runner(store.clone(), registry);

    let transition = Transition::new(resource.id.clone(), Phase::EnsureExists);
    store.upsert_transition(&transition).await.unwrap();

    runner.execute_attempt(transition.id, false).await.unwrap();
    let stored = store.get_transition(&transition.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransitionStatus::InProgress);
    assert_eq!(stored.attempt, 1);

    let resource_after_failure = store.get_resource(&resource.id).await.unwrap().unwrap();
    assert_eq!(resource_after_failure.state, ResourceState::Newborn, "a retryable failure should not park the resource in a terminal state");
}

/// Scenario: exhausting every retry parks the resource in
/// `creation_terminated` and fails the transition.
#[tokio::test]
async fn retries_exhausted_parks_resource_in_creation_terminated() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let resource = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
    store.upsert_resource(&resource).await.unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(ScriptedAdapter { fail_create: true, ..ScriptedAdapter::new("vpc_network") }));
    let runner = runner(store.clone(), registry);

    let mut transition = Transition::new(resource.id.clone(), Phase::EnsureExists);
    transition.status = TransitionStatus::InProgress;
    transition.attempt = 5;
    store.upsert_transition(&transition).await.unwrap();

    runner.execute_attempt(transition.id, false).await.unwrap();

    let stored = store.get_transition(&transition.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransitionStatus::Failed);
    let final_resource = store.get_resource(&resource.id).await.unwrap().unwrap();
    assert_eq!(final_resource.state, ResourceState::CreationTerminated);
}

/// Scenario: a second worker picking up the same in-progress attempt is
/// suppressed rather than double-running the phase body.
#[tokio::test]
async fn duplicate_task_submission_is_suppressed() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let resource = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
    store.upsert_resource(&resource).await.unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(ScriptedAdapter::new("vpc_network")));
    let runner = runner(store.clone(), registry);

    let mut transition = Transition::new(resource.id.clone(), Phase::EnsureExists);
    transition.status = TransitionStatus::InProgress;
    store.upsert_transition(&transition).await.unwrap();

    // Simulates a second worker grabbing the same in-flight transition.
    runner.execute_attempt(transition.id, false).await.unwrap();

    let stored = store.get_transition(&transition.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransitionStatus::InProgress);
    assert_eq!(stored.attempt, 1, "duplicate submission should force a delayed reschedule, not run the phase body");

    let final_resource = store.get_resource(&resource.id).await.unwrap().unwrap();
    assert_eq!(final_resource.state, ResourceState::Newborn, "the phase body must not have run a second time");
}

/// Scenario: deleting a resource with an active reverse dependency blocks
/// until the dependent is deleted, then proceeds to ensure_deleted.
#[tokio::test]
async fn deletion_waits_for_reverse_dependencies() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let mut upstream = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
    upstream.desired_state = DesiredState::Deleted;
    upstream.state = ResourceState::Healthy;
    let mut downstream = Resource::new(ProjectId::new("p"), "firewall", "fw-a", json!({}));
    downstream.state = ResourceState::Healthy;
    store.upsert_resource(&upstream).await.unwrap();
    store.upsert_resource(&downstream).await.unwrap();
    store
        .add_dependency(&ResourceDependency { resource_id: downstream.id.clone(), depends_on: upstream.id.clone() })
        .await
        .unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(ScriptedAdapter::new("vpc_network")));
    registry.register(Arc::new(ScriptedAdapter::new("firewall")));
    let runner = runner(store.clone(), registry);

    let teardown = Transition::new(upstream.id.clone(), Phase::EnsureForwardDependenciesDeleted);
    store.upsert_transition(&teardown).await.unwrap();

    runner.execute_attempt(teardown.id, false).await.unwrap();
    let stored = store.get_transition(&teardown.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransitionStatus::InProgress, "should retry while the dependent firewall still exists");

    let mut deleted_downstream = downstream.clone();
    deleted_downstream.state = ResourceState::Deleted;
    store.upsert_resource(&deleted_downstream).await.unwrap();

    runner.execute_attempt(teardown.id, false).await.unwrap();
    let stored = store.get_transition(&teardown.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransitionStatus::Succeeded);

    let next = store
        .list_transitions(Some(&upstream.id))
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.phase == Phase::EnsureDeleted)
        .expect("ensure_deleted transition should have been created");
    assert_eq!(next.previous_transition, Some(teardown.id));
}
