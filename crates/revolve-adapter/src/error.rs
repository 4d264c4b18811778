use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("creation failed: {0}")]
    CreationFailed(String),

    #[error("deletion failed: {0}")]
    DeletionFailed(String),

    #[error("lookup failed: {0}")]
    LookupFailed(String),

    #[error("internal adapter error: {0}")]
    Internal(String),

    #[error("invalid config for kind '{kind}': {reason}")]
    InvalidConfig { kind: String, reason: String },

    #[error("no adapter registered for kind '{0}'")]
    UnknownKind(String),

    #[error("kind '{0}' does not support in-place update")]
    UpdateNotSupported(String),
}
