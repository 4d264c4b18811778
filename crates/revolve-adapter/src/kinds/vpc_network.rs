use std::sync::Arc;

use async_trait::async_trait;
use revolve_domain::{Health, Phase, ProjectId, Resource, RetryParams};
use serde_json::{json, Value};

use crate::adapter::ResourceAdapter;
use crate::client::GcpRestClient;
use crate::error::AdapterError;

/// `vpc_network` — a Compute Engine VPC. Slow to converge because GCP
/// auto-creates per-region subnetworks asynchronously after the network
/// itself reports as created, so `ensure_healthy` gets a longer timeout
/// than the adapter default.
pub struct VpcNetworkAdapter {
    client: Arc<GcpRestClient>,
}

impl VpcNetworkAdapter {
    pub fn new(client: Arc<GcpRestClient>) -> Self {
        Self { client }
    }

    fn self_link(&self, resource: &Resource) -> String {
        format!(
            "{}/compute/v1/projects/{}/global/networks/{}",
            self.client.base.compute,
            resource.project_id.as_str(),
            resource.hcl_slug
        )
    }
}

#[async_trait]
impl ResourceAdapter for VpcNetworkAdapter {
    fn kind(&self) -> &'static str {
        "vpc_network"
    }

    fn validate(&self, config: &Value) -> Result<(), AdapterError> {
        if !config.get("auto_create_subnetworks").map_or(true, |v| v.is_boolean()) {
            return Err(AdapterError::InvalidConfig {
                kind: self.kind().to_string(),
                reason: "auto_create_subnetworks must be a boolean".into(),
            });
        }
        Ok(())
    }

    fn retry_params(&self, phase: Phase) -> RetryParams {
        match phase {
            Phase::EnsureHealthy => RetryParams {
                retry_backoff: 2.0,
                max_retries: 15,
                total_timeout_secs: 4200,
                ..RetryParams::default()
            },
            _ => RetryParams::default(),
        }
    }

    async fn identify(&self, resource: &Resource) -> Result<Option<Value>, AdapterError> {
        self.client.get_json(&self.self_link(resource)).await
    }

    async fn list(&self, project_id: &ProjectId) -> Result<Vec<Value>, AdapterError> {
        let url = format!(
            "{}/compute/v1/projects/{}/global/networks",
            self.client.base.compute,
            project_id.as_str()
        );
        let body = self.client.get_json(&url).await?;
        Ok(body
            .and_then(|b| b.get("items").cloned())
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default())
    }

    async fn create(&self, resource: &Resource) -> Result<Value, AdapterError> {
        let cfg = &resource.config;
        let url = format!(
            "{}/compute/v1/projects/{}/global/networks",
            self.client.base.compute,
            resource.project_id.as_str()
        );
        let body = json!({
            "name": resource.hcl_slug,
            "routingConfig": { "routingMode": cfg.get("routing_mode").and_then(Value::as_str).unwrap_or("GLOBAL") },
            "mtu": cfg.get("mtu").and_then(Value::as_i64).unwrap_or(1460),
            "autoCreateSubnetworks": cfg.get("auto_create_subnetworks").and_then(Value::as_bool).unwrap_or(true),
        });
        let op = self.client.post_json(&url, &body).await?;
        if let Some(op_url) = op.get("selfLink").and_then(Value::as_str) {
            self.client.wait_for_operation(op_url, 60).await
        } else {
            Ok(op)
        }
    }

    async fn delete(&self, resource: &Resource) -> Result<(), AdapterError> {
        self.client.delete_json(&self.self_link(resource)).await?;
        Ok(())
    }

    async fn check_health(&self, resource: &Resource, observed: &Value) -> Result<Health, AdapterError> {
        let cfg = &resource.config;
        let auto_create = cfg.get("auto_create_subnetworks").and_then(Value::as_bool).unwrap_or(true);
        if !auto_create {
            // Subnetwork auto-creation is disabled, so the only check left
            // is the one `identify` already performed to get here.
            return Ok(Health::Healthy);
        }
        let subnet_count = observed
            .get("subnetworks")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        if subnet_count > 20 {
            Ok(Health::Healthy)
        } else {
            Ok(Health::Unhealthy)
        }
    }
}
