use std::collections::HashMap;

use async_trait::async_trait;
use revolve_domain::{Phase, Resource, ResourceEventType};

use crate::error::PhaseOutcome;
use crate::runner::{PhaseCtx, PhaseHandler};

/// A named in-place update subroutine, dispatched by `update_type`.
pub type UpdateFn = fn(&Resource) -> Result<(), String>;

/// Grounded on `transitions/tasks/ensure_updated.py`, left as the
/// extension point the original's design note (ii) calls for: no concrete
/// subcommands are wired up by default. Callers register one via
/// `register` keyed by the string a `Transition.update_type` carries.
#[derive(Default)]
pub struct EnsureUpdatedHandler {
    subcommands: HashMap<String, UpdateFn>,
}

impl EnsureUpdatedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, update_type: impl Into<String>, f: UpdateFn) -> &mut Self {
        self.subcommands.insert(update_type.into(), f);
        self
    }
}

#[async_trait]
impl PhaseHandler for EnsureUpdatedHandler {
    fn phase(&self) -> Phase {
        Phase::EnsureUpdated
    }

    async fn run(&self, ctx: &mut PhaseCtx) -> PhaseOutcome {
        let update_type = ctx
            .resource
            .config
            .get("update_type")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let Some(update_type) = update_type else {
            return PhaseOutcome::fail(ResourceEventType::UpdateFailed, "no update_type configured");
        };

        let Some(f) = self.subcommands.get(&update_type) else {
            return PhaseOutcome::fail(ResourceEventType::UpdateFailed, format!("no subcommand registered for {update_type}"));
        };

        match f(&ctx.resource) {
            Ok(()) => {
                if let Err(e) = ctx.record_resource_event(ResourceEventType::UpdateSucceeded, None).await {
                    return PhaseOutcome::retry(ResourceEventType::Error, e.to_string());
                }
                PhaseOutcome::Success
            }
            Err(reason) => PhaseOutcome::retry(ResourceEventType::UpdateFailed, reason),
        }
    }
}
