mod ensure_dependencies_ready;
mod ensure_deleted;
mod ensure_exists;
mod ensure_forward_dependencies_deleted;
mod ensure_healthy;
mod ensure_updated;

pub use ensure_deleted::EnsureDeletedHandler;
pub use ensure_dependencies_ready::EnsureDependenciesReadyHandler;
pub use ensure_exists::EnsureExistsHandler;
pub use ensure_forward_dependencies_deleted::EnsureForwardDependenciesDeletedHandler;
pub use ensure_healthy::EnsureHealthyHandler;
pub use ensure_updated::{EnsureUpdatedHandler, UpdateFn};
