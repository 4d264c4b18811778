use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use revolve_adapter::{AdapterRegistry, ResourceAdapter};
use revolve_domain::{
    Phase, Resource, ResourceEvent, ResourceEventType, Transition, TransitionEvent,
    TransitionEventType, TransitionId, TransitionStatus,
};
use revolve_store::Store;

use crate::checkpoint::CheckpointCache;
use crate::error::{EngineError, PhaseOutcome};
use crate::projector;

/// Matches `DEFAULT_TASK_KWARGS['time_limit']` in `task_class.py`: the hard
/// wall-clock limit for one attempt, enforced by the runtime rather than
/// observed in-process (that is the soft limit's job, which phase handlers
/// would check via a cancellation token — not modeled here since no phase
/// body in this crate runs long enough to need it).
const HARD_TIME_LIMIT: StdDuration = StdDuration::from_secs(660);

/// Hydrated state one phase handler operates over. Every resource mutation
/// a handler makes goes through `record_resource_event`, the single write
/// path the projector's design note (i) calls for — there is no parallel
/// channel that sets `resource.state` directly.
pub struct PhaseCtx {
    pub store: Arc<dyn Store>,
    pub adapter: Arc<dyn ResourceAdapter>,
    pub checkpoints: Arc<CheckpointCache>,
    pub resource: Resource,
    pub transition: Transition,
    /// Spacing between existence re-checks, `FETCH_DELAY` in
    /// `resources/base_resource.py` (3s in production). Overridable so
    /// integration tests don't spend real wall-clock time polling.
    pub poll_delay: StdDuration,
}

impl PhaseCtx {
    /// Appends a `ResourceEvent`, projects it onto `self.resource`
    /// (existence/health always; `state` when the projector table has a
    /// match), and persists the updated resource. This is the only path a
    /// phase handler should use to report what happened.
    pub async fn record_resource_event(
        &mut self,
        event_type: ResourceEventType,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let event = ResourceEvent::new(
            self.resource.id.clone(),
            Some(self.transition.id),
            Some(self.transition.phase),
            event_type,
            reason,
        );
        self.store.append_resource_event(&event).await?;
        projector::project_event(&mut self.resource, &event);
        self.store.upsert_resource(&self.resource).await?;
        Ok(())
    }

    /// Creates and persists the follow-on transition a successful phase
    /// hands off to, chaining `previous_transition` the way
    /// `get_transition_history` walks it back on the Python side.
    pub async fn create_next_transition(&self, phase: Phase) -> Result<Transition, EngineError> {
        let mut next = Transition::new(self.resource.id.clone(), phase);
        next.previous_transition = Some(self.transition.id);
        self.store.upsert_transition(&next).await?;
        Ok(next)
    }
}

/// One phase's logic, grounded on the corresponding
/// `transitions/tasks/ensure_*.py` module. Implementations must not swallow
/// adapter errors silently — unhandled `AdapterError`s convert to
/// `PhaseOutcome::Retry` via `From<AdapterError>`.
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    fn phase(&self) -> Phase;
    async fn run(&self, ctx: &mut PhaseCtx) -> PhaseOutcome;
}

/// Executes one transition attempt end to end: dedup gate, pre-run
/// bookkeeping, phase body dispatch, and success/retry/failure bookkeeping.
/// Grounded on `TransitionTask` in `transitions/celery_utils/task_class.py`;
/// the `before_start`/`on_retry`/`on_success`/`on_failure` hook sequence
/// Celery drives for us there is reimplemented here as one explicit
/// function, since nothing in this crate plays the role of a task
/// framework invoking those hooks automatically.
pub struct TaskRunner {
    store: Arc<dyn Store>,
    registry: AdapterRegistry,
    checkpoints: Arc<CheckpointCache>,
    handlers: HashMap<Phase, Arc<dyn PhaseHandler>>,
    poll_delay: StdDuration,
}

impl TaskRunner {
    pub fn new(store: Arc<dyn Store>, registry: AdapterRegistry, checkpoints: CheckpointCache) -> Self {
        TaskRunner {
            store,
            registry,
            checkpoints: Arc::new(checkpoints),
            handlers: HashMap::new(),
            poll_delay: StdDuration::from_secs(3),
        }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn PhaseHandler>) -> &mut Self {
        self.handlers.insert(handler.phase(), handler);
        self
    }

    /// Overrides the existence-recheck spacing; used by tests to avoid
    /// real multi-second sleeps.
    pub fn with_poll_delay(mut self, delay: StdDuration) -> Self {
        self.poll_delay = delay;
        self
    }

    async fn append_transition_event(
        &self,
        transition: &mut Transition,
        event_type: TransitionEventType,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let event = TransitionEvent::new(transition.id, event_type, reason);
        self.store.append_transition_event(&event).await?;
        if let Some(status) = projector::decide_next_status(event_type) {
            transition.status = status;
        }
        transition.updated_at = Utc::now();
        Ok(())
    }

    async fn record_resource_event(
        &self,
        resource: &mut Resource,
        transition: &Transition,
        event_type: ResourceEventType,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let event = ResourceEvent::new(
            resource.id.clone(),
            Some(transition.id),
            Some(transition.phase),
            event_type,
            reason,
        );
        self.store.append_resource_event(&event).await?;
        projector::project_event(resource, &event);
        self.store.upsert_resource(resource).await?;
        Ok(())
    }

    /// Runs one attempt of `transition_id`. `rescheduled` mirrors the
    /// `rescheduled=True` kwarg a hard-timeout continuation is submitted
    /// with, which bypasses the duplicate-detection branch below.
    pub async fn execute_attempt(
        &self,
        transition_id: TransitionId,
        rescheduled: bool,
    ) -> Result<(), EngineError> {
        let mut transition = self
            .store
            .get_transition(&transition_id)
            .await?
            .ok_or_else(|| EngineError::HydrationFailed(format!("transition {transition_id} not found")))?;
        let resource = self
            .store
            .get_resource(&transition.resource_id)
            .await?
            .ok_or_else(|| {
                EngineError::HydrationFailed(format!("resource {} not found", transition.resource_id))
            })?;

        if transition.status == TransitionStatus::InProgress && transition.attempt == 0 && !rescheduled {
            tracing::warn!(transition_id = %transition.id, "potential duplicate task, forcing delayed retry");
            self.append_transition_event(
                &mut transition,
                TransitionEventType::DuplicateDetected,
                Some("potential_duplicate_task".to_string()),
            )
            .await?;
            transition.attempt += 1;
            transition.scheduled_at = Some(Utc::now() + Duration::seconds(90));
            self.store.upsert_transition(&transition).await?;
            return Ok(());
        }

        if matches!(transition.status, TransitionStatus::Succeeded | TransitionStatus::Failed) {
            tracing::info!(transition_id = %transition.id, status = %transition.status, "revoking duplicate attempt on terminal transition");
            return Ok(());
        }

        if transition.attempt == 0 {
            self.append_transition_event(&mut transition, TransitionEventType::Started, None)
                .await?;
            self.store.upsert_transition(&transition).await?;
        }

        let adapter = self.registry.get(&resource.kind)?;
        let handler = self
            .handlers
            .get(&transition.phase)
            .cloned()
            .ok_or_else(|| EngineError::UnknownKind(format!("no phase handler registered for {:?}", transition.phase)))?;

        let mut ctx = PhaseCtx {
            store: self.store.clone(),
            adapter,
            checkpoints: self.checkpoints.clone(),
            resource,
            transition: transition.clone(),
            poll_delay: self.poll_delay,
        };

        let timed_out = tokio::time::timeout(HARD_TIME_LIMIT, handler.run(&mut ctx)).await;
        let PhaseCtx { mut resource, mut transition, .. } = ctx;

        let outcome = match timed_out {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                if !transition.rescheduled && transition.attempt < 2 {
                    self.append_transition_event(
                        &mut transition,
                        TransitionEventType::Rescheduled,
                        Some("hard_timeout".to_string()),
                    )
                    .await?;
                    transition.rescheduled = true;
                    transition.attempt += 1;
                    transition.scheduled_at = Some(Utc::now() + Duration::seconds(60));
                    self.store.upsert_transition(&transition).await?;
                } else {
                    self.record_resource_event(
                        &mut resource,
                        &transition,
                        ResourceEventType::TerminalFailure,
                        Some("hard_timeout".to_string()),
                    )
                    .await?;
                    self.append_transition_event(
                        &mut transition,
                        TransitionEventType::Failed,
                        Some("hard_timeout".to_string()),
                    )
                    .await?;
                    self.store.upsert_transition(&transition).await?;
                }
                return Ok(());
            }
        };

        match outcome {
            PhaseOutcome::Success => {
                self.append_transition_event(&mut transition, TransitionEventType::Succeeded, None)
                    .await?;
                self.store.upsert_transition(&transition).await?;
            }
            PhaseOutcome::Retry { event_type, reason, info: _, exhausted_side_effect } => {
                self.handle_retry(&mut transition, &mut resource, event_type, reason, exhausted_side_effect)
                    .await?;
            }
            PhaseOutcome::TerminalFailure { event_type, reason, info: _ } => {
                self.record_resource_event(&mut resource, &transition, event_type, reason.clone())
                    .await?;
                self.append_transition_event(&mut transition, TransitionEventType::Failed, reason)
                    .await?;
                self.store.upsert_transition(&transition).await?;
            }
        }

        Ok(())
    }

    async fn handle_retry(
        &self,
        transition: &mut Transition,
        resource: &mut Resource,
        event_type: ResourceEventType,
        reason: Option<String>,
        exhausted_side_effect: Option<ResourceEventType>,
    ) -> Result<(), EngineError> {
        let adapter = self.registry.get(&resource.kind)?;
        let params = adapter.retry_params(transition.phase);
        let task_age = (Utc::now() - transition.created_at).num_seconds();

        match crate::retry::RetryPolicy::next_countdown(&params, transition.attempt, Some(task_age)) {
            crate::retry::RetryDecision::Countdown(secs) => {
                self.record_resource_event(resource, transition, event_type, reason.clone())
                    .await?;
                self.append_transition_event(transition, TransitionEventType::Retrying, reason)
                    .await?;
                transition.attempt += 1;
                transition.scheduled_at = Some(Utc::now() + Duration::seconds(secs.ceil() as i64));
                self.store.upsert_transition(transition).await?;
            }
            crate::retry::RetryDecision::Exhausted(exhaustion_reason) => {
                self.record_resource_event(
                    resource,
                    transition,
                    ResourceEventType::TerminalFailure,
                    Some(exhaustion_reason.to_string()),
                )
                .await?;

                let mut side_effects = Vec::new();
                if matches!(transition.phase, Phase::EnsureForwardDependenciesDeleted | Phase::EnsureDeleted) {
                    side_effects.push(ResourceEventType::DeletionTerminated);
                }
                if let Some(se) = exhausted_side_effect {
                    if !side_effects.contains(&se) {
                        side_effects.push(se);
                    }
                }
                for se in side_effects {
                    self.record_resource_event(resource, transition, se, Some(exhaustion_reason.to_string()))
                        .await?;
                }

                self.append_transition_event(
                    transition,
                    TransitionEventType::Failed,
                    Some(exhaustion_reason.to_string()),
                )
                .await?;
                self.store.upsert_transition(transition).await?;
            }
        }
        Ok(())
    }
}
