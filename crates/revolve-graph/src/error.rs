use revolve_domain::ResourceId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("resource '{resource}' depends on unknown resource '{depends_on}'")]
    DanglingDependency {
        resource: ResourceId,
        depends_on: ResourceId,
    },

    #[error("resource '{0}' depends on itself")]
    SelfDependency(ResourceId),

    #[error("cycle detected in resource dependency graph")]
    CycleDetected,

    #[error("duplicate resource id '{0}' in input set")]
    DuplicateResourceId(ResourceId),

    #[error("multiple errors")]
    Multiple(Vec<GraphError>),
}
