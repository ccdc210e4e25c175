//! Remote model hub adapter
//!
//! One hub search per family keyword, then a detail lookup per hit for the
//! revision sha (the version token) and the file listing (the format).
//!
//! The production client searches through the hub's REST API with reqwest and
//! reads repository detail through hf-hub. It is only compiled with the `hub`
//! feature; without it the adapter reports the source as unavailable and
//! discovers nothing.

use super::{KnownModels, SourceAdapter};
use crate::config::RegistryConfig;
use crate::error::SourceError;
use crate::models::{
    ModelRecord, ModelSource, ModelType, infer_format_from_files, infer_parameter_count,
    infer_quantization,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// One search hit
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubModelSummary {
    /// Namespaced hub id, e.g. "mistralai/Mistral-7B-v0.1"
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub downloads: Option<u64>,
    #[serde(default)]
    pub likes: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default, rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Repository detail for one hub model
#[derive(Debug, Clone, Default)]
pub struct HubModelInfo {
    /// Revision sha of the default branch
    pub sha: String,
    /// Repository-relative file names
    pub files: Vec<String>,
}

/// Transport to the remote hub
#[async_trait]
pub trait HubClient: Send + Sync {
    async fn search(&self, keyword: &str, limit: usize)
    -> Result<Vec<HubModelSummary>, SourceError>;

    async fn model_info(&self, model_id: &str) -> Result<HubModelInfo, SourceError>;
}

#[cfg(feature = "hub")]
pub use hf::HfHubClient;

#[cfg(feature = "hub")]
mod hf {
    use super::*;
    use hf_hub::api::tokio::{Api, ApiBuilder};
    use std::time::Duration;

    /// HuggingFace Hub client
    pub struct HfHubClient {
        http: reqwest::Client,
        api: Api,
        endpoint: String,
    }

    impl HfHubClient {
        pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SourceError> {
            let http = reqwest::Client::builder().timeout(timeout).build()?;
            let api = ApiBuilder::new()
                .with_endpoint(endpoint.to_string())
                .with_progress(false)
                .build()
                .map_err(|e| {
                    SourceError::Unavailable(format!("Failed to create HF API client: {}", e))
                })?;

            Ok(Self {
                http,
                api,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            })
        }
    }

    #[async_trait]
    impl HubClient for HfHubClient {
        async fn search(
            &self,
            keyword: &str,
            limit: usize,
        ) -> Result<Vec<HubModelSummary>, SourceError> {
            let limit = limit.to_string();
            let hits = self
                .http
                .get(format!("{}/api/models", self.endpoint))
                .query(&[
                    ("search", keyword),
                    ("limit", limit.as_str()),
                    ("sort", "downloads"),
                ])
                .send()
                .await?
                .error_for_status()?
                .json::<Vec<HubModelSummary>>()
                .await?;
            Ok(hits)
        }

        async fn model_info(&self, model_id: &str) -> Result<HubModelInfo, SourceError> {
            let info = self
                .api
                .model(model_id.to_string())
                .info()
                .await
                .map_err(|e| SourceError::Hub(format!("{}: {}", model_id, e)))?;

            Ok(HubModelInfo {
                sha: info.sha,
                files: info.siblings.into_iter().map(|s| s.rfilename).collect(),
            })
        }
    }
}

#[cfg(feature = "hub")]
fn production_client(config: &RegistryConfig) -> Result<Arc<dyn HubClient>, String> {
    let timeout = std::time::Duration::from_secs(config.http_timeout_secs);
    HfHubClient::new(&config.hub_endpoint, timeout)
        .map(|client| Arc::new(client) as Arc<dyn HubClient>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "hub"))]
fn production_client(_config: &RegistryConfig) -> Result<Arc<dyn HubClient>, String> {
    Err("built without the `hub` feature".to_string())
}

/// Adapter producing `RemoteHub` records
pub struct RemoteHubAdapter {
    client: Result<Arc<dyn HubClient>, String>,
    keywords: Vec<String>,
    limit_per_keyword: usize,
    web_base: String,
}

impl RemoteHubAdapter {
    pub fn new(client: Arc<dyn HubClient>, keywords: Vec<String>, limit_per_keyword: usize) -> Self {
        Self {
            client: Ok(client),
            keywords,
            limit_per_keyword,
            web_base: "https://huggingface.co".to_string(),
        }
    }

    /// Adapter for a hub that cannot be reached from this build or environment
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            client: Err(reason.into()),
            keywords: Vec::new(),
            limit_per_keyword: 0,
            web_base: String::new(),
        }
    }

    /// Build the production adapter, degrading to unavailable on client errors
    pub fn from_config(config: &RegistryConfig) -> Self {
        match production_client(config) {
            Ok(client) => Self::new(
                client,
                config.hub_keywords.clone(),
                config.hub_limit_per_keyword,
            )
            .with_web_base(&config.hub_endpoint),
            Err(reason) => {
                tracing::warn!(reason = %reason, "Remote hub client unavailable");
                Self::unavailable(reason)
            }
        }
    }

    /// Base used to build record URLs
    pub fn with_web_base(mut self, base: &str) -> Self {
        self.web_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn is_available(&self) -> bool {
        self.client.is_ok()
    }

    fn build_record(
        &self,
        keyword: &str,
        hit: HubModelSummary,
        info: HubModelInfo,
    ) -> ModelRecord {
        let name = hit.id.rsplit('/').next().unwrap_or(&hit.id).to_string();

        let model_type = match ModelType::parse(keyword) {
            ModelType::Other => ModelType::infer_from_name(&hit.id),
            family => family,
        };

        let mut record = ModelRecord::new(hit.id.clone(), name.clone(), ModelSource::RemoteHub)
            .with_version(info.sha)
            .with_type(model_type)
            .with_format(infer_format_from_files(info.files.iter().map(String::as_str)))
            .with_url(format!("{}/{}", self.web_base, hit.id))
            .with_tags(hit.tags)
            .with_tags([keyword.to_ascii_lowercase()]);

        record.quantization = infer_quantization(&name);
        record.parameter_count = infer_parameter_count(&name);
        record.last_updated = hit.last_modified;

        let author = hit
            .author
            .or_else(|| hit.id.split_once('/').map(|(org, _)| org.to_string()));
        if let Some(author) = author {
            record.metadata.insert("author".to_string(), author);
        }
        if let Some(downloads) = hit.downloads {
            record
                .metadata
                .insert("downloads".to_string(), downloads.to_string());
        }
        if let Some(likes) = hit.likes {
            record.metadata.insert("likes".to_string(), likes.to_string());
        }
        if let Some(pipeline_tag) = hit.pipeline_tag {
            record
                .metadata
                .insert("pipeline_tag".to_string(), pipeline_tag);
        }

        record
    }
}

#[async_trait]
impl SourceAdapter for RemoteHubAdapter {
    fn source(&self) -> ModelSource {
        ModelSource::RemoteHub
    }

    async fn discover(&self, known: &KnownModels) -> Result<Vec<ModelRecord>, SourceError> {
        let client = match &self.client {
            Ok(client) => client,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Remote hub unavailable, skipping");
                return Ok(Vec::new());
            }
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut unchanged = 0usize;

        for keyword in &self.keywords {
            let hits = client.search(keyword, self.limit_per_keyword).await?;
            tracing::debug!(keyword = %keyword, hits = hits.len(), "Hub search complete");

            for hit in hits.into_iter().take(self.limit_per_keyword) {
                if !seen.insert(hit.id.clone()) {
                    continue;
                }

                let info = match client.model_info(&hit.id).await {
                    Ok(info) => info,
                    Err(e) => {
                        tracing::warn!(model_id = %hit.id, error = %e, "Skipping hub model");
                        continue;
                    }
                };

                if known.has_version(&hit.id, &info.sha) {
                    unchanged += 1;
                    continue;
                }

                records.push(self.build_record(keyword, hit, info));
            }
        }

        tracing::info!(
            discovered = records.len(),
            unchanged = unchanged,
            "Remote hub discovery complete"
        );

        Ok(records)
    }
}
