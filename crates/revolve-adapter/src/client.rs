use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::AdapterError;

/// Base URLs for the Compute Engine REST API, overridden in tests to point
/// at a `wiremock` server.
#[derive(Clone)]
pub struct BaseUrls {
    pub compute: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com".into(),
        }
    }
}

/// Abstraction over GCP token acquisition — enables test injection.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, AdapterError>;
}

/// Production token provider backed by Application Default Credentials.
pub struct AdcTokenProvider {
    inner: Arc<dyn gcp_auth::TokenProvider>,
}

#[async_trait]
impl TokenProvider for AdcTokenProvider {
    async fn token(&self) -> Result<String, AdapterError> {
        let token = self
            .inner
            .token(&["https://www.googleapis.com/auth/cloud-platform"])
            .await
            .map_err(|e| AdapterError::Internal(format!("GCP auth failed: {}", e)))?;
        Ok(token.as_str().to_string())
    }
}

/// Test token provider — returns a fixed string without any network call.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, AdapterError> {
        Ok(self.0.clone())
    }
}

/// Thin REST client shared by every GCP resource-kind adapter. Mirrors the
/// "fetch a bearer token, POST/GET/DELETE JSON, poll the resulting
/// long-running operation" shape common to Compute Engine's network,
/// firewall, subnetwork, and instance APIs.
pub struct GcpRestClient {
    client: reqwest::Client,
    token: Box<dyn TokenProvider>,
    pub base: BaseUrls,
}

impl GcpRestClient {
    /// Build a client using Application Default Credentials.
    pub async fn from_adc() -> Result<Self, AdapterError> {
        let inner = gcp_auth::provider()
            .await
            .map_err(|e| AdapterError::Internal(format!("failed to initialise GCP ADC: {}", e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            token: Box::new(AdcTokenProvider { inner }),
            base: BaseUrls::default(),
        })
    }

    /// Build a client with a static bearer token and custom base URLs, for
    /// tests against a `wiremock` server.
    pub fn with_static_token(token: &str, base: BaseUrls) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: Box::new(StaticToken(token.to_string())),
            base,
        }
    }

    async fn bearer(&self) -> Result<String, AdapterError> {
        self.token.token().await
    }

    /// Convert a GCP REST error envelope into a human-readable message.
    pub fn extract_gcp_error(body: &Value) -> String {
        let err = &body["error"];
        let status = err["status"].as_str().unwrap_or("UNKNOWN");
        let message = err["message"].as_str().unwrap_or("unknown error");

        let mut parts: Vec<String> = Vec::new();
        if let Some(details) = err["details"].as_array() {
            for d in details {
                if let Some(reason) = d["reason"].as_str() {
                    parts.push(reason.to_string());
                }
                if let Some(violations) = d["fieldViolations"].as_array() {
                    for v in violations {
                        let field = v["field"].as_str().unwrap_or("?");
                        let desc = v["description"].as_str().unwrap_or("invalid");
                        parts.push(format!("field '{}': {}", field, desc));
                    }
                }
            }
        }

        if parts.is_empty() {
            format!("{}: {}", status, message)
        } else {
            format!("{}: {} ({})", status, message, parts.join("; "))
        }
    }

    pub async fn get_json(&self, url: &str) -> Result<Option<Value>, AdapterError> {
        let token = self.bearer().await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AdapterError::LookupFailed(format!("GET {url}: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::Internal(format!("GET {url} decode: {e}")))?;
        if body.get("error").is_some() {
            return Err(AdapterError::LookupFailed(format!("GET {url}: {}", Self::extract_gcp_error(&body))));
        }
        Ok(Some(body))
    }

    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value, AdapterError> {
        let token = self.bearer().await?;
        debug!(url, "GCP POST");
        let resp: Value = self
            .client
            .post(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .map_err(|e| AdapterError::CreationFailed(format!("POST {url}: {e}")))?
            .json()
            .await
            .map_err(|e| AdapterError::Internal(format!("POST {url} decode: {e}")))?;
        if resp.get("error").is_some() {
            return Err(AdapterError::CreationFailed(format!("POST {url}: {}", Self::extract_gcp_error(&resp))));
        }
        Ok(resp)
    }

    pub async fn delete_json(&self, url: &str) -> Result<Value, AdapterError> {
        let token = self.bearer().await?;
        debug!(url, "GCP DELETE");
        let resp = self
            .client
            .delete(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AdapterError::DeletionFailed(format!("DELETE {url}: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(json!({"alreadyAbsent": true}));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::Internal(format!("DELETE {url} decode: {e}")))?;
        if body.get("error").is_some() {
            return Err(AdapterError::DeletionFailed(format!("DELETE {url}: {}", Self::extract_gcp_error(&body))));
        }
        Ok(body)
    }

    /// Poll a GCP long-running (global) operation until it completes.
    /// Backoff: 1s, 2s, 4s, 8s, 16s, 30s, 30s, … capped at `max_polls`.
    pub async fn wait_for_operation(&self, op_url: &str, max_polls: usize) -> Result<Value, AdapterError> {
        let token = self.bearer().await?;
        let delays = [1u64, 2, 4, 8, 16, 30];

        for (i, &delay) in delays.iter().cycle().take(max_polls).enumerate() {
            let resp: Value = self
                .client
                .get(op_url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| AdapterError::Internal(format!("poll {op_url}: {e}")))?
                .json()
                .await
                .map_err(|e| AdapterError::Internal(format!("poll decode: {e}")))?;

            if resp["status"].as_str() == Some("DONE") || resp["done"].as_bool().unwrap_or(false) {
                if resp.get("error").is_some() {
                    return Err(AdapterError::CreationFailed(format!(
                        "operation failed: {}",
                        Self::extract_gcp_error(&json!({"error": resp["error"]}))
                    )));
                }
                return Ok(resp);
            }

            let poll = i + 1;
            if poll % 10 == 0 {
                info!(poll, op_url, "still waiting for GCP operation");
            }
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        Err(AdapterError::CreationFailed(format!(
            "GCP operation timed out after {max_polls} polls: {op_url}"
        )))
    }
}
