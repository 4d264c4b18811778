use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use revolve_domain::{Health, Phase, ProjectId, Resource, RetryParams};
use serde_json::Value;

use crate::error::AdapterError;

/// Polymorphic capability set for one resource kind (`"vpc_network"`,
/// `"firewall"`, `"subnet"`, `"instance"`, …). One `ResourceAdapter`
/// implementation exists per kind; phase handlers in `revolve-engine`
/// call through this trait rather than branching on `resource.kind`
/// themselves.
#[async_trait]
pub trait ResourceAdapter: Send + Sync + 'static {
    /// Registry key this adapter handles, e.g. `"vpc_network"`.
    fn kind(&self) -> &'static str;

    /// Structural validation of a declared config block for this kind,
    /// run at ingestion time before a `Resource` row is even created.
    fn validate(&self, config: &Value) -> Result<(), AdapterError>;

    /// Retry tuning for a given phase. Kinds override this for phases
    /// known to converge slowly (e.g. a VPC network's `ensure_healthy`).
    fn retry_params(&self, phase: Phase) -> RetryParams {
        let _ = phase;
        RetryParams::default()
    }

    /// Look up the resource in the cloud by its adapter-derived identifier
    /// (e.g. a `selfLink`). `Ok(None)` means confirmed absent.
    async fn identify(&self, resource: &Resource) -> Result<Option<Value>, AdapterError>;

    /// List every resource of this kind that exists under `project_id`,
    /// used by `create-gcp-project`/import flows and orphan detection.
    async fn list(&self, project_id: &ProjectId) -> Result<Vec<Value>, AdapterError>;

    /// Issue the creation call. Returns the raw cloud API response.
    async fn create(&self, resource: &Resource) -> Result<Value, AdapterError>;

    /// Issue the deletion call. Idempotent: deleting an already-absent
    /// resource is not an error.
    async fn delete(&self, resource: &Resource) -> Result<(), AdapterError>;

    /// Evaluate every health check this kind defines against the last
    /// observed cloud state, producing one aggregate verdict.
    async fn check_health(&self, resource: &Resource, observed: &Value) -> Result<Health, AdapterError>;

    /// Apply an in-place update to bring `resource` in line with its
    /// current declared config. Kinds with no update path (the common
    /// case — see `ensure_updated`'s extension-point design) return
    /// `UpdateNotSupported`.
    async fn update(&self, resource: &Resource, observed: &Value) -> Result<Value, AdapterError> {
        let _ = observed;
        Err(AdapterError::UpdateNotSupported(resource.kind.clone()))
    }
}

/// Lookup table from registry key to the adapter that handles it.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn ResourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn ResourceAdapter>) -> &mut Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn ResourceAdapter>, AdapterError> {
        self.adapters
            .get(kind)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownKind(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }
}
