//! Append-only usage analytics
//!
//! Every tracked use is one JSON file in the usage directory. Statistics are a
//! full scan of those files.

use crate::metrics;
use crate::models::ModelType;
use crate::registry::Registry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// One recorded use of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub model_id: String,
    pub usage_type: String,
    pub timestamp: DateTime<Utc>,
    /// Captured when the event was written; absent for unknown ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<ModelType>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Aggregated counts over usage events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub total_usage: usize,
    pub per_model: BTreeMap<String, usize>,
    pub per_usage_type: BTreeMap<String, usize>,
    /// Most recent event in the aggregated set
    pub last_used: Option<DateTime<Utc>>,
}

/// Writes and aggregates usage events
pub struct UsageTracker {
    usage_dir: PathBuf,
    registry: Arc<Registry>,
    sequence: AtomicU64,
}

impl UsageTracker {
    pub fn new(usage_dir: impl Into<PathBuf>, registry: Arc<Registry>) -> Self {
        Self {
            usage_dir: usage_dir.into(),
            registry,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn usage_dir(&self) -> &Path {
        &self.usage_dir
    }

    /// Record one use of `model_id`
    ///
    /// Unknown ids are still recorded. Returns whether the event was written.
    pub async fn track_usage(
        &self,
        model_id: &str,
        usage_type: &str,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> bool {
        let record = self.registry.get(model_id).await;
        if record.is_none() {
            tracing::warn!(model_id = %model_id, "Tracking usage for unregistered model");
        }

        let event = UsageEvent {
            model_id: model_id.to_string(),
            usage_type: usage_type.to_string(),
            timestamp: Utc::now(),
            model_name: record.as_ref().map(|r| r.name.clone()),
            model_type: record.as_ref().map(|r| r.model_type),
            metadata,
        };

        match self.write_event(&event).await {
            Ok(path) => {
                tracing::debug!(model_id = %model_id, usage_type = %usage_type, path = ?path, "Usage tracked");
                metrics::record_usage_event(usage_type);
                true
            }
            Err(e) => {
                tracing::error!(model_id = %model_id, error = %e, "Failed to write usage event");
                false
            }
        }
    }

    async fn write_event(&self, event: &UsageEvent) -> anyhow::Result<PathBuf> {
        use anyhow::Context;

        tokio::fs::create_dir_all(&self.usage_dir)
            .await
            .with_context(|| format!("Failed to create usage directory: {:?}", self.usage_dir))?;

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let file_name = format!(
            "{}-{}-{}.json",
            event.timestamp.timestamp_micros(),
            std::process::id(),
            sequence
        );
        let path = self.usage_dir.join(file_name);

        let json = serde_json::to_string_pretty(event).context("Failed to serialize usage event")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write usage event: {:?}", path))?;

        Ok(path)
    }

    /// Aggregate every event, or only those for `model_id`
    pub async fn usage_stats(&self, model_id: Option<&str>) -> UsageStats {
        let mut stats = UsageStats::default();

        let mut entries = match tokio::fs::read_dir(&self.usage_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = ?self.usage_dir, error = %e, "No usage directory to scan");
                return stats;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read usage directory entry");
                    break;
                }
            };

            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let event = match read_event(&path).await {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Skipping unreadable usage event");
                    continue;
                }
            };

            if model_id.is_some_and(|id| id != event.model_id) {
                continue;
            }

            stats.total_usage += 1;
            *stats.per_model.entry(event.model_id).or_default() += 1;
            *stats.per_usage_type.entry(event.usage_type).or_default() += 1;
            if stats.last_used.is_none_or(|last| event.timestamp > last) {
                stats.last_used = Some(event.timestamp);
            }
        }

        stats
    }
}

async fn read_event(path: &Path) -> anyhow::Result<UsageEvent> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}
