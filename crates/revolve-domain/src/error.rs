use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid resource id: {0}")]
    InvalidResourceId(String),

    #[error("invalid transition id: {0}")]
    InvalidTransitionId(String),

    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("no phase handler registered for phase {0}")]
    UnknownPhase(String),

    #[error("invalid state transition: {from} -> {to} via event {event}")]
    InvalidStateTransition {
        from: String,
        to: String,
        event: String,
    },

    #[error("no projection rule matches (phase={phase}, event={event}, reason={reason:?})")]
    NoProjectionRule {
        phase: String,
        event: String,
        reason: Option<String>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
