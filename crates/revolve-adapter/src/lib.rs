pub mod adapter;
pub mod client;
pub mod error;
pub mod kinds;

use std::sync::Arc;

pub use adapter::{AdapterRegistry, ResourceAdapter};
pub use client::GcpRestClient;
pub use error::AdapterError;
pub use kinds::{FirewallAdapter, InstanceAdapter, SubnetAdapter, VpcNetworkAdapter};

/// Build the standard registry covering every supported GCP resource kind,
/// sharing one REST client (and its token provider) across adapters.
pub fn gcp_registry(client: Arc<GcpRestClient>) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry
        .register(Arc::new(VpcNetworkAdapter::new(client.clone())))
        .register(Arc::new(FirewallAdapter::new(client.clone())))
        .register(Arc::new(SubnetAdapter::new(client.clone())))
        .register(Arc::new(InstanceAdapter::new(client)));
    registry
}
