use std::sync::Arc;

use async_trait::async_trait;
use revolve_domain::{Health, ProjectId, Resource};
use serde_json::{json, Value};

use crate::adapter::ResourceAdapter;
use crate::client::GcpRestClient;
use crate::error::AdapterError;

/// `firewall` — a Compute Engine firewall rule scoped to a `vpc_network`.
/// Converges fast: existence is the only health signal GCP offers.
pub struct FirewallAdapter {
    client: Arc<GcpRestClient>,
}

impl FirewallAdapter {
    pub fn new(client: Arc<GcpRestClient>) -> Self {
        Self { client }
    }

    fn self_link(&self, resource: &Resource) -> String {
        format!(
            "{}/compute/v1/projects/{}/global/firewalls/{}",
            self.client.base.compute,
            resource.project_id.as_str(),
            resource.hcl_slug
        )
    }
}

#[async_trait]
impl ResourceAdapter for FirewallAdapter {
    fn kind(&self) -> &'static str {
        "firewall"
    }

    fn validate(&self, config: &Value) -> Result<(), AdapterError> {
        let network = config.get("network_self_link").and_then(Value::as_str);
        if network.map_or(true, str::is_empty) {
            return Err(AdapterError::InvalidConfig {
                kind: self.kind().to_string(),
                reason: "network_self_link is required".into(),
            });
        }
        match config.get("direction").and_then(Value::as_str) {
            Some("INGRESS") | Some("EGRESS") => {}
            other => {
                return Err(AdapterError::InvalidConfig {
                    kind: self.kind().to_string(),
                    reason: format!("direction must be INGRESS or EGRESS, got {:?}", other),
                })
            }
        }
        Ok(())
    }

    async fn identify(&self, resource: &Resource) -> Result<Option<Value>, AdapterError> {
        self.client.get_json(&self.self_link(resource)).await
    }

    async fn list(&self, project_id: &ProjectId) -> Result<Vec<Value>, AdapterError> {
        let url = format!(
            "{}/compute/v1/projects/{}/global/firewalls",
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
            "{}/compute/v1/projects/{}/global/firewalls",
            self.client.base.compute,
            resource.project_id.as_str()
        );
        let mut body = json!({
            "name": resource.hcl_slug,
            "network": cfg.get("network_self_link"),
            "priority": cfg.get("priority").and_then(Value::as_i64).unwrap_or(1000),
            "direction": cfg.get("direction"),
            "logConfig": { "enable": cfg.get("enable_logging").and_then(Value::as_bool).unwrap_or(false) },
        });
        for field in ["sourceRanges", "destinationRanges", "targetTags", "sourceTags", "allowed", "denied"] {
            let key = match field {
                "sourceRanges" => "source_ranges",
                "destinationRanges" => "destination_ranges",
                "targetTags" => "target_tags",
                "sourceTags" => "source_tags",
                "allowed" => "allow_rules",
                "denied" => "deny_rules",
                _ => unreachable!(),
            };
            if let Some(v) = cfg.get(key) {
                body[field] = v.clone();
            }
        }
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
