use std::sync::Arc;

use async_trait::async_trait;
use revolve_domain::{Health, ProjectId, Resource};
use serde_json::{json, Value};

use crate::adapter::ResourceAdapter;
use crate::client::GcpRestClient;
use crate::error::AdapterError;

/// `subnet` — a regional Compute Engine subnetwork attached to a
/// `vpc_network`. Region is part of the resource's identity since
/// Compute Engine scopes subnetworks per-region.
pub struct SubnetAdapter {
    client: Arc<GcpRestClient>,
}

impl SubnetAdapter {
    pub fn new(client: Arc<GcpRestClient>) -> Self {
        Self { client }
    }

    fn region<'a>(&self, resource: &'a Resource) -> &'a str {
        resource.config.get("region").and_then(Value::as_str).unwrap_or("")
    }

    fn self_link(&self, resource: &Resource) -> String {
        format!(
            "{}/compute/v1/projects/{}/regions/{}/subnetworks/{}",
            self.client.base.compute,
            resource.project_id.as_str(),
            self.region(resource),
            resource.hcl_slug
        )
    }
}

#[async_trait]
impl ResourceAdapter for SubnetAdapter {
    fn kind(&self) -> &'static str {
        "subnet"
    }

    fn validate(&self, config: &Value) -> Result<(), AdapterError> {
        for field in ["network_self_link", "region", "ip_cidr_range"] {
            if config.get(field).and_then(Value::as_str).map_or(true, str::is_empty) {
                return Err(AdapterError::InvalidConfig {
                    kind: self.kind().to_string(),
                    reason: format!("{field} is required"),
                });
            }
        }
        Ok(())
    }

    async fn identify(&self, resource: &Resource) -> Result<Option<Value>, AdapterError> {
        self.client.get_json(&self.self_link(resource)).await
    }

    async fn list(&self, project_id: &ProjectId) -> Result<Vec<Value>, AdapterError> {
        let url = format!(
            "{}/compute/v1/projects/{}/aggregated/subnetworks",
            self.client.base.compute,
            project_id.as_str()
        );
        let body = self.client.get_json(&url).await?;
        Ok(body
            .and_then(|b| b.get("items").cloned())
            .and_then(|v| v.as_object().cloned())
            .map(|scopes| {
                scopes
                    .values()
                    .filter_map(|scope| scope.get("subnetworks"))
                    .filter_map(Value::as_array)
                    .flatten()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, resource: &Resource) -> Result<Value, AdapterError> {
        let cfg = &resource.config;
        let region = self.region(resource);
        let url = format!(
            "{}/compute/v1/projects/{}/regions/{}/subnetworks",
            self.client.base.compute,
            resource.project_id.as_str(),
            region
        );
        let body = json!({
            "name": resource.hcl_slug,
            "network": cfg.get("network_self_link"),
            "ipCidrRange": cfg.get("ip_cidr_range"),
            "region": region,
        });
        let op = self.client.post_json(&url, &body).await?;
        if let Some(op_url) = op.get("selfLink").and_then(Value::as_str) {
            self.client.wait_for_operation(op_url, 30).await
        } else {
            Ok(op)
        }
    }

    async fn delete(&self, resource: &Resource) -> Result<(), AdapterError> {
        self.client.delete_json(&self.self_link(resource)).await?;
        Ok(())
    }

    async fn check_health(&self, _resource: &Resource, _observed: &Value) -> Result<Health, AdapterError> {
        Ok(Health::Healthy)
    }
}
