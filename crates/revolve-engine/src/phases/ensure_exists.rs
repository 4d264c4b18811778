use async_trait::async_trait;
use revolve_domain::{Phase, ResourceEventType};

use crate::error::PhaseOutcome;
use crate::runner::{PhaseCtx, PhaseHandler};

/// Grounded on `transitions/tasks/ensure_exists.py`: pre-check existence,
/// then checkpointed creation, then a bounded existence poll to confirm the
/// cloud has converged before declaring success.
pub struct EnsureExistsHandler;

const POST_CREATE_CHECKS: u32 = 10;

#[async_trait]
impl PhaseHandler for EnsureExistsHandler {
    fn phase(&self) -> Phase {
        Phase::EnsureExists
    }

    async fn run(&self, ctx: &mut PhaseCtx) -> PhaseOutcome {
        match ctx.adapter.identify(&ctx.resource).await {
            Ok(Some(observed)) => return finish_found(ctx, &observed, "found_before_creation").await,
            Ok(None) => {}
            Err(e) => return e.into(),
        }

        let transition_id = ctx.transition.id;
        let retry_index = ctx.transition.attempt;
        let adapter = ctx.adapter.clone();
        let resource_for_create = ctx.resource.clone();

        let result = ctx
            .checkpoints
            .clone()
            .get_or_execute(&*ctx.store, &transition_id, "create_resource", retry_index, || async move {
                match adapter.create(&resource_for_create).await {
                    Ok(resp) => Ok((true, resp)),
                    Err(e) => Ok((false, serde_json::json!({ "error": e.to_string() }))),
                }
            })
            .await;

        let (created, response) = match result {
            Ok(pair) => pair,
            Err(e) => return PhaseOutcome::retry(ResourceEventType::Error, e.to_string()),
        };

        if !created {
            return PhaseOutcome::retry(ResourceEventType::TerminalFailure, "creation_request_failed");
        }

        ctx.resource.creation_response = Some(response);
        if let Err(e) = ctx
            .record_resource_event(ResourceEventType::CreationSucceeded, Some("creation_request_succeeded".to_string()))
            .await
        {
            return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
        }

        tokio::time::sleep(ctx.poll_delay).await;
        for _ in 0..POST_CREATE_CHECKS {
            match ctx.adapter.identify(&ctx.resource).await {
                Ok(Some(observed)) => return finish_found(ctx, &observed, "found_after_creation").await,
                Ok(None) => tokio::time::sleep(ctx.poll_delay).await,
                Err(e) => return e.into(),
            }
        }

        PhaseOutcome::retry(ResourceEventType::ResourceNotFound, "resource_not_found")
    }
}

async fn finish_found(ctx: &mut PhaseCtx, observed: &serde_json::Value, reason: &str) -> PhaseOutcome {
    ctx.resource.getter_response = Some(observed.clone());
    if let Err(e) = ctx
        .record_resource_event(ResourceEventType::ResourceFound, Some(reason.to_string()))
        .await
    {
        return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
    }
    if let Err(e) = ctx.create_next_transition(Phase::EnsureHealthy).await {
        return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
    }
    PhaseOutcome::Success
}
