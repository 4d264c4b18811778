use std::sync::Arc;

use async_trait::async_trait;
use revolve_domain::{Health, ProjectId, Resource};
use serde_json::{json, Value};

use crate::adapter::ResourceAdapter;
use crate::client::GcpRestClient;
use crate::error::AdapterError;

/// `instance` — a Compute Engine VM. Unlike the other kinds, health is a
/// lifecycle status string (`RUNNING`, `STAGING`, …) rather than a
/// structural property of the resource, so `check_health` reads
/// `observed.status` directly.
pub struct InstanceAdapter {
    client: Arc<GcpRestClient>,
}

impl InstanceAdapter {
    pub fn new(client: Arc<GcpRestClient>) -> Self {
        Self { client }
    }

    fn zone<'a>(&self, resource: &'a Resource) -> &'a str {
        resource.config.get("zone").and_then(Value::as_str).unwrap_or("")
    }

    fn self_link(&self, resource: &Resource) -> String {
        format!(
            "{}/compute/v1/projects/{}/zones/{}/instances/{}",
            self.client.base.compute,
            resource.project_id.as_str(),
            self.zone(resource),
            resource.hcl_slug
        )
    }
}

#[async_trait]
impl ResourceAdapter for InstanceAdapter {
    fn kind(&self) -> &'static str {
        "instance"
    }

    fn validate(&self, config: &Value) -> Result<(), AdapterError> {
        for field in ["zone", "machine_type", "source_image", "network_self_link"] {
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
        // GCP scopes instance listing per-zone; a project-wide `aggregated/instances`
        // call would be the real implementation but is out of scope without a
        // concrete zone list to aggregate over.
        let url = format!(
            "{}/compute/v1/projects/{}/aggregated/instances",
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
                    .filter_map(|scope| scope.get("instances"))
                    .filter_map(Value::as_array)
                    .flatten()
                    .filter(|inst| {
                        matches!(
                            inst.get("status").and_then(Value::as_str),
                            Some("PROVISIONING") | Some("STAGING") | Some("RUNNING")
                        )
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, resource: &Resource) -> Result<Value, AdapterError> {
        let cfg = &resource.config;
        let zone = self.zone(resource);
        let url = format!(
            "{}/compute/v1/projects/{}/zones/{}/instances",
            self.client.base.compute,
            resource.project_id.as_str(),
            zone
        );
        let machine_type_url = format!(
            "zones/{}/machineTypes/{}",
            zone,
            cfg.get("machine_type").and_then(Value::as_str).unwrap_or("")
        );
        let body = json!({
            "name": resource.hcl_slug,
            "machineType": machine_type_url,
            "disks": [{
                "boot": true,
                "initializeParams": { "sourceImage": cfg.get("source_image") },
            }],
            "networkInterfaces": [{ "network": cfg.get("network_self_link") }],
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

    async fn check_health(&self, _resource: &Resource, observed: &Value) -> Result<Health, AdapterError> {
        match observed.get("status").and_then(Value::as_str) {
            Some("RUNNING") => Ok(Health::Healthy),
            Some(_) => Ok(Health::Unhealthy),
            None => Ok(Health::Unknown),
        }
    }
}
