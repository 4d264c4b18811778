pub mod checkpoint;
pub mod daemons;
pub mod error;
pub mod phases;
pub mod projector;
pub mod retry;
pub mod runner;

pub use checkpoint::CheckpointCache;
pub use error::{EngineError, PhaseOutcome};
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{PhaseCtx, PhaseHandler, TaskRunner};

/// Registers every built-in phase handler against a fresh `TaskRunner`.
/// Grounded on the set of `transitions/tasks/ensure_*.py` modules the
/// original wires into its Celery task registry at import time.
pub fn register_builtin_handlers(runner: &mut TaskRunner) {
    runner
        .register_handler(std::sync::Arc::new(phases::EnsureDependenciesReadyHandler))
        .register_handler(std::sync::Arc::new(phases::EnsureExistsHandler))
        .register_handler(std::sync::Arc::new(phases::EnsureHealthyHandler))
        .register_handler(std::sync::Arc::new(phases::EnsureForwardDependenciesDeletedHandler))
        .register_handler(std::sync::Arc::new(phases::EnsureDeletedHandler))
        .register_handler(std::sync::Arc::new(phases::EnsureUpdatedHandler::new()));
}
