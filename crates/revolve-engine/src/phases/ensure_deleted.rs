use async_trait::async_trait;
use revolve_domain::{Phase, ResourceEventType};

use crate::error::PhaseOutcome;
use crate::runner::{PhaseCtx, PhaseHandler};

const POST_DELETE_CHECKS: u32 = 10;

/// Grounded on `transitions/tasks/ensure_deleted.py`: pre-check existence,
/// then checkpointed deletion, then a bounded existence poll to confirm the
/// cloud has converged before declaring the resource gone.
pub struct EnsureDeletedHandler;

#[async_trait]
impl PhaseHandler for EnsureDeletedHandler {
    fn phase(&self) -> Phase {
        Phase::EnsureDeleted
    }

    async fn run(&self, ctx: &mut PhaseCtx) -> PhaseOutcome {
        match ctx.adapter.identify(&ctx.resource).await {
            Ok(None) => return finish_absent(ctx, "absent_before_deletion").await,
            Ok(Some(_)) => {}
            Err(e) => return e.into(),
        }

        let transition_id = ctx.transition.id;
        let retry_index = ctx.transition.attempt;
        let adapter = ctx.adapter.clone();
        let resource_for_delete = ctx.resource.clone();

        let result = ctx
            .checkpoints
            .clone()
            .get_or_execute(&*ctx.store, &transition_id, "delete_resource", retry_index, || async move {
                match adapter.delete(&resource_for_delete).await {
                    Ok(()) => Ok((true, serde_json::json!({}))),
                    Err(e) => Ok((false, serde_json::json!({ "error": e.to_string() }))),
                }
            })
            .await;

        let (deleted, _response) = match result {
            Ok(pair) => pair,
            Err(e) => return PhaseOutcome::retry(ResourceEventType::Error, e.to_string()),
        };

        if !deleted {
            return PhaseOutcome::retry(ResourceEventType::DeletionFailed, "deletion_request_failed");
        }

        if let Err(e) = ctx
            .record_resource_event(ResourceEventType::DeletionSucceeded, Some("deletion_request_succeeded".to_string()))
            .await
        {
            return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
        }

        tokio::time::sleep(ctx.poll_delay).await;
        for _ in 0..POST_DELETE_CHECKS {
            match ctx.adapter.identify(&ctx.resource).await {
                Ok(None) => return finish_absent(ctx, "absent_after_deletion").await,
                Ok(Some(_)) => tokio::time::sleep(ctx.poll_delay).await,
                Err(e) => return e.into(),
            }
        }

        // Not logged as `resource_found`: doing so would write a stale
        // "exists" fact onto the resource from a poll that is about to be
        // superseded by the next attempt. The runner's own exhaustion path
        // still parks the resource in `deletion_terminated` once retries
        // run out.
        PhaseOutcome::retry(ResourceEventType::Warning, "not_yet_absent")
    }
}

async fn finish_absent(ctx: &mut PhaseCtx, reason: &str) -> PhaseOutcome {
    if let Err(e) = ctx
        .record_resource_event(ResourceEventType::ResourceNotFound, Some(reason.to_string()))
        .await
    {
        return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
    }
    PhaseOutcome::Success
}
