use std::sync::Arc;
use std::time::Duration;

use revolve_domain::{DesiredState, Phase, ResourceState, Transition, TransitionStatus};
use revolve_store::Store;

use crate::error::EngineError;
use crate::runner::TaskRunner;

const SCAN_BATCH_SIZE: usize = 500;

/// Finds resources whose `desired_state` has no outstanding transition
/// driving them toward it and schedules one. Grounded on
/// `transitions/tasks/daemon_tasks.create_missing_transitions`: the two
/// desired states considered are `healthy` (normal reconciliation) and
/// `deleted` (teardown), each excluded from consideration once the resource
/// has already reached its target or a terminal failure sink.
pub async fn create_missing_transitions(store: &dyn Store) -> Result<usize, EngineError> {
    let mut created = 0;
    for desired_state in [DesiredState::Healthy, DesiredState::Deleted] {
        created += create_missing_for(store, desired_state).await?;
    }
    Ok(created)
}

async fn create_missing_for(store: &dyn Store, desired_state: DesiredState) -> Result<usize, EngineError> {
    let target_state = match desired_state {
        DesiredState::Healthy => ResourceState::Healthy,
        DesiredState::Deleted => ResourceState::Deleted,
        _ => unreachable!("create_missing_transitions only schedules Healthy/Deleted desired states"),
    };

    let resources = store.list_resources().await?;
    let candidates: Vec<_> = resources
        .into_iter()
        .filter(|r| r.desired_state == desired_state)
        .filter(|r| r.state != target_state && r.state != ResourceState::CreationTerminated)
        .take(SCAN_BATCH_SIZE)
        .collect();

    if candidates.is_empty() {
        return Ok(0);
    }

    let outstanding_transitions = store.list_transitions(None).await?;
    let has_outstanding: std::collections::HashSet<_> = outstanding_transitions
        .iter()
        .filter(|t| !t.status.is_terminal())
        .map(|t| t.resource_id.clone())
        .collect();

    let mut created = 0;
    for resource in candidates {
        if has_outstanding.contains(&resource.id) {
            continue;
        }

        let phase = match desired_state {
            DesiredState::Healthy => {
                let deps = store.list_dependencies().await?;
                if deps.iter().any(|d| d.resource_id == resource.id) {
                    Phase::EnsureDependenciesReady
                } else {
                    Phase::EnsureExists
                }
            }
            DesiredState::Deleted => Phase::EnsureForwardDependenciesDeleted,
            _ => unreachable!("create_missing_transitions only schedules Healthy/Deleted desired states"),
        };

        let transition = Transition::new(resource.id.clone(), phase);
        store.upsert_transition(&transition).await?;
        created += 1;
    }

    Ok(created)
}

/// Finds `pending` transitions and submits them to the runner. Grounded on
/// `daemon_tasks.submit_transition_tasks`: there is no broker in this crate,
/// so "submit" means running the attempt inline via the shared `TaskRunner`
/// rather than enqueuing onto a message bus.
pub async fn submit_transition_tasks(store: &dyn Store, runner: &TaskRunner) -> Result<usize, EngineError> {
    let transitions = store.list_transitions(None).await?;
    let batch: Vec<_> = transitions
        .into_iter()
        .filter(|t| t.status == TransitionStatus::Pending)
        .take(SCAN_BATCH_SIZE)
        .collect();
    let submitted = batch.len();
    for transition in batch {
        runner.execute_attempt(transition.id, false).await?;
    }
    Ok(submitted)
}

/// Runs both daemon loops on fixed intervals until the process exits.
/// Grounded on the Celery beat schedule that drives `daemon_tasks.py`'s two
/// tasks periodically; here it is a pair of `tokio::time::interval` loops
/// instead of a beat scheduler.
pub async fn run_daemon_loops(store: Arc<dyn Store>, runner: Arc<TaskRunner>, scan_interval: Duration) {
    let mut ticker = tokio::time::interval(scan_interval);
    loop {
        ticker.tick().await;
        if let Err(e) = create_missing_transitions(&*store).await {
            tracing::error!(error = %e, "create_missing_transitions failed");
        }
        if let Err(e) = submit_transition_tasks(&*store, &runner).await {
            tracing::error!(error = %e, "submit_transition_tasks failed");
        }
    }
}
