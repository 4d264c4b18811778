use revolve_domain::ResourceEventType;
use serde_json::Value;

/// What a phase handler decided about the current attempt. Replaces the
/// two exception shapes the original throws from inside a Celery task body
/// (`TaskRetryException` / `TaskFailureException`) with an explicit return
/// value, since Rust has no exception-based control flow for the runner to
/// catch.
#[derive(Debug, Clone)]
pub enum PhaseOutcome {
    /// The phase completed; the handler has already appended a `succeeded`
    /// resource event (if any) and, where applicable, enqueued the next
    /// phase's transition.
    Success,
    /// Schedule another attempt. Mirrors `TaskRetryException(event_type,
    /// reason, info, exhausted_side_effect)`: `event_type`/`reason` are
    /// logged as a resource event on *this* attempt; `exhausted_side_effect`,
    /// if set, is only emitted once retries are exhausted.
    Retry {
        event_type: ResourceEventType,
        reason: Option<String>,
        info: Option<Value>,
        exhausted_side_effect: Option<ResourceEventType>,
    },
    /// No further retries. Mirrors `TaskFailureException(event_type, reason,
    /// info)`.
    TerminalFailure {
        event_type: ResourceEventType,
        reason: Option<String>,
        info: Option<Value>,
    },
}

impl PhaseOutcome {
    pub fn retry(event_type: ResourceEventType, reason: impl Into<String>) -> Self {
        PhaseOutcome::Retry {
            event_type,
            reason: Some(reason.into()),
            info: None,
            exhausted_side_effect: None,
        }
    }

    pub fn retry_with_exhaustion(
        event_type: ResourceEventType,
        reason: impl Into<String>,
        exhausted_side_effect: ResourceEventType,
    ) -> Self {
        PhaseOutcome::Retry {
            event_type,
            reason: Some(reason.into()),
            info: None,
            exhausted_side_effect: Some(exhausted_side_effect),
        }
    }

    pub fn fail(event_type: ResourceEventType, reason: impl Into<String>) -> Self {
        PhaseOutcome::TerminalFailure {
            event_type,
            reason: Some(reason.into()),
            info: None,
        }
    }
}

/// Errors from the runner's own plumbing (store I/O, missing rows) rather
/// than from a phase handler's domain logic. `EngineError::Adapter` maps
/// any unhandled adapter I/O failure into a retryable outcome at the call
/// site, preserving "uncaught I/O-class errors are retryable" from the
/// original's `RETRY_FOR` exception list as a type-level default rather
/// than a catch-all `except Exception`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] revolve_store::StoreError),
    #[error("adapter error: {0}")]
    Adapter(#[from] revolve_adapter::AdapterError),
    #[error("graph error: {0}")]
    Graph(#[from] revolve_graph::GraphError),
    #[error("context hydration failed: {0}")]
    HydrationFailed(String),
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),
}

impl From<revolve_adapter::AdapterError> for PhaseOutcome {
    fn from(err: revolve_adapter::AdapterError) -> Self {
        PhaseOutcome::Retry {
            event_type: ResourceEventType::Error,
            reason: Some(err.to_string()),
            info: None,
            exhausted_side_effect: None,
        }
    }
}
