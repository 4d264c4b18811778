use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Raw YAML representation of one config document. Grounded on
/// `nclav-config::raw::RawEnclave`'s duck-typed-struct shape, but covers the
/// `provider`/`locals`/`resource "<kind>" "<name>"` blocks spec.md describes
/// instead of the teacher's enclave/partition hierarchy.
#[derive(Debug, Deserialize)]
pub struct RawDocument {
    pub provider: Option<RawProvider>,
    #[serde(default)]
    pub locals: HashMap<String, Value>,
    #[serde(default)]
    pub resources: Vec<RawResourceBlock>,
}

#[derive(Debug, Deserialize)]
pub struct RawProvider {
    pub project: String,
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawResourceBlock {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub config: Value,
    /// Overrides `desired_state` for this block; defaults to "healthy".
    pub desired_state: Option<String>,
}
