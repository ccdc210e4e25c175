//! Custom HTTP manifest adapter
//!
//! Sources are listed in `custom_sources.json`:
//! ```json
//! { "sources": [ { "name": "internal", "url": "https://models.example.com/index.json", "enabled": true } ] }
//! ```
//! Each enabled source serves `{"models": [...]}`.

use super::{KnownModels, SourceAdapter};
use crate::error::SourceError;
use crate::models::{ModelFormat, ModelRecord, ModelSource, ModelType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinSet;

/// One configured HTTP source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Contents of the custom sources file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomSourcesFile {
    #[serde(default)]
    pub sources: Vec<CustomSource>,
}

impl CustomSourcesFile {
    /// Written when no sources file exists yet
    pub fn template() -> Self {
        Self {
            sources: vec![CustomSource {
                name: "example".to_string(),
                url: "https://example.com/models.json".to_string(),
                enabled: false,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct CustomManifest {
    #[serde(default)]
    models: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CustomEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, rename = "type")]
    model_type: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    size_bytes: Option<u64>,
    #[serde(default)]
    parameters: Option<u64>,
    #[serde(default)]
    quantization: Option<String>,
    #[serde(default)]
    last_updated: Option<serde_json::Value>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// Accepts RFC 3339 strings or unix seconds; anything else is dropped
fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => {
            let secs = n.as_f64()?;
            DateTime::from_timestamp(secs.trunc() as i64, (secs.fract() * 1e9) as u32)
        }
        _ => None,
    }
}

fn build_record(source_name: &str, entry: CustomEntry) -> ModelRecord {
    let id = format!("custom:{}:{}", source_name, entry.id);
    let name = entry.name.unwrap_or_else(|| entry.id.clone());

    let mut record = ModelRecord::new(id, name, ModelSource::Custom)
        .with_version(entry.version.unwrap_or_default())
        .with_type(entry.model_type.as_deref().map_or(ModelType::Other, ModelType::parse))
        .with_format(entry.format.as_deref().map_or(ModelFormat::Other, ModelFormat::parse))
        .with_tags(entry.tags);

    record.description = entry.description;
    record.url = entry.url;
    record.path = entry.path;
    record.size_bytes = entry.size_bytes;
    record.parameter_count = entry.parameters;
    record.quantization = entry.quantization;
    record.last_updated = entry.last_updated.as_ref().and_then(parse_timestamp);

    for (key, value) in entry.metadata {
        let value = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        record.metadata.insert(key, value);
    }
    record
        .metadata
        .insert("custom_source".to_string(), source_name.to_string());

    record
}

/// Adapter producing `Custom` records from HTTP manifests
pub struct CustomHttpAdapter {
    sources_file: PathBuf,
    http_timeout: Duration,
}

impl CustomHttpAdapter {
    pub fn new(sources_file: impl Into<PathBuf>, http_timeout: Duration) -> Self {
        Self {
            sources_file: sources_file.into(),
            http_timeout,
        }
    }

    pub fn sources_file(&self) -> &Path {
        &self.sources_file
    }

    /// Read the sources file, writing the template when it is absent
    async fn load_sources(&self) -> Result<Option<CustomSourcesFile>, SourceError> {
        if !tokio::fs::try_exists(&self.sources_file).await? {
            let template = serde_json::to_string_pretty(&CustomSourcesFile::template())?;
            if let Some(parent) = self.sources_file.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            match tokio::fs::write(&self.sources_file, template).await {
                Ok(()) => tracing::info!(
                    path = ?self.sources_file,
                    "Wrote custom sources template"
                ),
                Err(e) => tracing::warn!(
                    path = ?self.sources_file,
                    error = %e,
                    "Failed to write custom sources template"
                ),
            }
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.sources_file).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn fetch_source(
        client: &reqwest::Client,
        source: &CustomSource,
    ) -> Result<Vec<ModelRecord>, SourceError> {
        let manifest: CustomManifest = client
            .get(&source.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut records = Vec::with_capacity(manifest.models.len());
        for value in manifest.models {
            match serde_json::from_value::<CustomEntry>(value) {
                Ok(entry) => records.push(build_record(&source.name, entry)),
                Err(e) => {
                    tracing::warn!(source = %source.name, error = %e, "Skipping malformed manifest entry");
                }
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl SourceAdapter for CustomHttpAdapter {
    fn source(&self) -> ModelSource {
        ModelSource::Custom
    }

    async fn discover(&self, _known: &KnownModels) -> Result<Vec<ModelRecord>, SourceError> {
        let Some(file) = self.load_sources().await? else {
            return Ok(Vec::new());
        };

        let client = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()?;

        // Fetched concurrently; each source is bounded only by the client timeout
        let mut fetches: JoinSet<(usize, CustomSource, Result<Vec<ModelRecord>, SourceError>)> =
            JoinSet::new();
        for (index, source) in file.sources.into_iter().filter(|s| s.enabled).enumerate() {
            let client = client.clone();
            fetches.spawn(async move {
                let result = Self::fetch_source(&client, &source).await;
                (index, source, result)
            });
        }

        let mut fetched = Vec::with_capacity(fetches.len());
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((index, source, Ok(found))) => {
                    tracing::info!(source = %source.name, count = found.len(), "Fetched custom manifest");
                    fetched.push((index, found));
                }
                Ok((_, source, Err(e))) => {
                    tracing::warn!(
                        source = %source.name,
                        url = %source.url,
                        error = %e,
                        "Custom source failed"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Custom source fetch task failed");
                }
            }
        }

        // Keep the order sources are listed in
        fetched.sort_by_key(|(index, _)| *index);
        let records = fetched.into_iter().flat_map(|(_, found)| found).collect();

        Ok(records)
    }
}
