//! Freeing server memory by unloading every model except the one in use.
//!
//! LM Studio keeps models resident until told otherwise, so switching between
//! models quickly runs out of VRAM. When
//! [`unload_other_models`](crate::LlmOptions::unload_other_models) is on, each
//! request first unloads every other loaded model. This is best effort: failures
//! are logged and reported, never raised.

use crate::types::LlmOptions;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Model management side channel of a local server
#[async_trait]
pub trait ModelAdmin: Send + Sync {
    /// Identifiers of the currently loaded models
    async fn list_loaded_models(&self) -> Result<Vec<String>>;

    async fn unload_model(&self, id: &str) -> Result<()>;
}

/// [`ModelAdmin`] for the LM Studio REST API
#[derive(Debug, Clone)]
pub struct LmStudioAdmin {
    client: reqwest::Client,
    host: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    state: Option<String>,
}

impl LmStudioAdmin {
    /// `base_url` is the OpenAI-compatible URL (`http://host:1234/v1`); the
    /// admin API lives on the same host.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            client,
            host: admin_host(base_url),
        })
    }

    pub fn from_options(options: &LlmOptions) -> Result<Self> {
        Self::new(&options.base_url, Duration::from_secs(options.timeout))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::api(status.as_u16(), body))
        }
    }
}

#[async_trait]
impl ModelAdmin for LmStudioAdmin {
    async fn list_loaded_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/v0/models", self.host))
            .send()
            .await?;
        let list: ModelList = Self::check(response).await?.json().await?;
        Ok(list
            .data
            .into_iter()
            .filter(|entry| entry.state.as_deref() == Some("loaded"))
            .map(|entry| entry.id)
            .collect())
    }

    async fn unload_model(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/v1/models/unload", self.host))
            .json(&json!({ "instance_id": id }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Strip the OpenAI path suffix from a base URL
fn admin_host(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .to_string()
}

/// What one unload pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnloadReport {
    pub unloaded: Vec<String>,
    /// `(model id or "<list>", error message)`
    pub failures: Vec<(String, String)>,
}

impl UnloadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Unload every loaded model except `keep`
pub async fn unload_other_models(admin: &dyn ModelAdmin, keep: &str) -> UnloadReport {
    let mut report = UnloadReport::default();

    let loaded = match admin.list_loaded_models().await {
        Ok(loaded) => loaded,
        Err(e) => {
            log::warn!("Could not list loaded models: {}", e);
            report.failures.push(("<list>".to_string(), e.to_string()));
            return report;
        }
    };

    for id in loaded.into_iter().filter(|id| id != keep) {
        match admin.unload_model(&id).await {
            Ok(()) => {
                log::info!("Unloaded model {}", id);
                report.unloaded.push(id);
            }
            Err(e) => {
                log::warn!("Failed to unload model {}: {}", id, e);
                report.failures.push((id, e.to_string()));
            }
        }
    }

    report
}
