use async_trait::async_trait;
use revolve_domain::{Phase, ResourceEventType, ResourceState};

use crate::error::PhaseOutcome;
use crate::runner::{PhaseCtx, PhaseHandler};

/// Grounded on `transitions/tasks/ensure_dependencies_ready.py`: gate this
/// resource's advancement on every declared dependency being `healthy`, or
/// fail terminally if one of them is stuck in a terminal sink.
pub struct EnsureDependenciesReadyHandler;

#[async_trait]
impl PhaseHandler for EnsureDependenciesReadyHandler {
    fn phase(&self) -> Phase {
        Phase::EnsureDependenciesReady
    }

    async fn run(&self, ctx: &mut PhaseCtx) -> PhaseOutcome {
        let dependencies = match ctx.store.list_dependencies().await {
            Ok(deps) => deps,
            Err(e) => return PhaseOutcome::retry(ResourceEventType::Error, e.to_string()),
        };
        let own_deps: Vec<_> = dependencies
            .into_iter()
            .filter(|d| d.resource_id == ctx.resource.id)
            .collect();

        if own_deps.is_empty() {
            if let Err(e) = ctx
                .record_resource_event(ResourceEventType::DependenciesReady, None)
                .await
            {
                return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
            }
            if let Err(e) = ctx.create_next_transition(Phase::EnsureExists).await {
                return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
            }
            return PhaseOutcome::Success;
        }

        for dep in &own_deps {
            let upstream = match ctx.store.get_resource(&dep.depends_on).await {
                Ok(Some(r)) => r,
                Ok(None) => {
                    return PhaseOutcome::fail(ResourceEventType::TerminalFailure, "dependency_missing")
                }
                Err(e) => return PhaseOutcome::retry(ResourceEventType::Error, e.to_string()),
            };

            if upstream.state == ResourceState::Healthy {
                continue;
            }
            if matches!(
                upstream.state,
                ResourceState::CreationTerminated | ResourceState::DeletionTerminated | ResourceState::Unhealthy
            ) {
                return PhaseOutcome::fail(ResourceEventType::TerminalFailure, "dependency_failed");
            }
            return PhaseOutcome::retry(ResourceEventType::DependenciesPending, "not_ready");
        }

        if let Err(e) = ctx
            .record_resource_event(ResourceEventType::DependenciesReady, None)
            .await
        {
            return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
        }
        if let Err(e) = ctx.create_next_transition(Phase::EnsureExists).await {
            return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
        }
        PhaseOutcome::Success
    }
}
