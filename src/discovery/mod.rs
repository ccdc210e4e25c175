//! Discovery engine
//!
//! Runs adapters for a selection of sources, serving each from the
//! [`DiscoveryCache`] while its entry is fresh. A failing or slow source only
//! costs its own records for the pass.

pub mod cache;

pub use cache::{CacheEntry, DiscoveryCache};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult, SourceError};
use crate::metrics;
use crate::models::{ModelRecord, ModelSource};
use crate::progress::OperationTracker;
use crate::sources::{
    CustomHttpAdapter, KnownModels, LocalFilesystemAdapter, RemoteHubAdapter, SourceAdapter,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// How one source fared in the most recent pass
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// Served from a fresh cache entry
    Cached { records: usize },
    /// Adapter was called and succeeded
    Fetched { records: usize },
    /// Adapter errored or exceeded the per-source timeout
    Failed { error: String },
}

impl SourceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Orchestrates source adapters behind a per-source TTL cache
pub struct DiscoveryEngine {
    adapters: BTreeMap<ModelSource, Arc<dyn SourceAdapter>>,
    cache: DiscoveryCache,
    source_timeout: Duration,
    progress: Arc<OperationTracker>,
    last_outcomes: RwLock<BTreeMap<ModelSource, SourceOutcome>>,
}

impl DiscoveryEngine {
    /// Create an engine with no adapters
    pub fn new(
        cache: DiscoveryCache,
        source_timeout: Duration,
        progress: Arc<OperationTracker>,
    ) -> Self {
        Self {
            adapters: BTreeMap::new(),
            cache,
            source_timeout,
            progress,
            last_outcomes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register an adapter under the source it reports, replacing any previous one
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        let source = adapter.source();
        if self.adapters.insert(source, adapter).is_some() {
            tracing::warn!(source = %source, "Replacing adapter for source");
        }
        self
    }

    /// Engine wired with the production adapters for every discoverable source
    pub fn from_config(config: &RegistryConfig, progress: Arc<OperationTracker>) -> Self {
        let cache = DiscoveryCache::new(Duration::from_secs(config.cache_ttl_secs));

        Self::new(
            cache,
            Duration::from_secs(config.source_timeout_secs),
            progress,
        )
        .with_adapter(Arc::new(RemoteHubAdapter::from_config(config)))
        .with_adapter(Arc::new(LocalFilesystemAdapter::new(&config.models_dir)))
        .with_adapter(Arc::new(CustomHttpAdapter::new(
            config.custom_sources_path(),
            Duration::from_secs(config.http_timeout_secs),
        )))
    }

    /// Sources with a configured adapter, in processing order
    pub fn sources(&self) -> Vec<ModelSource> {
        self.adapters.keys().copied().collect()
    }

    pub fn progress(&self) -> &Arc<OperationTracker> {
        &self.progress
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    /// Per-source outcome of the most recent pass
    pub async fn last_outcomes(&self) -> BTreeMap<ModelSource, SourceOutcome> {
        self.last_outcomes.read().await.clone()
    }

    /// When each source was last fetched from its adapter
    pub async fn cache_timestamps(&self) -> BTreeMap<ModelSource, DateTime<Utc>> {
        self.cache.timestamps().await
    }

    /// Run one discovery pass
    ///
    /// `sources` defaults to every configured source. Records are returned in
    /// processing order without cross-source deduplication. Only a request for
    /// a source that cannot be discovered is an error.
    pub async fn discover(
        &self,
        sources: Option<&[ModelSource]>,
        force_refresh: bool,
        known: &KnownModels,
    ) -> RegistryResult<Vec<ModelRecord>> {
        let mut requested: Vec<ModelSource> = Vec::new();
        for source in sources.map_or_else(|| self.sources(), <[ModelSource]>::to_vec) {
            if !requested.contains(&source) {
                requested.push(source);
            }
        }

        let op = self.progress.create_operation("discovery").await;
        self.progress.start(op).await;

        let mut plan: Vec<(ModelSource, Arc<dyn SourceAdapter>)> =
            Vec::with_capacity(requested.len());
        for source in requested {
            let error = match self.adapters.get(&source) {
                Some(adapter) if source != ModelSource::Unknown => {
                    plan.push((source, adapter.clone()));
                    continue;
                }
                _ if source == ModelSource::Unknown => RegistryError::UnknownSource(source),
                _ => RegistryError::SourceNotConfigured(source),
            };
            self.progress
                .fail(op, &error.to_string(), "Discovery aborted")
                .await;
            return Err(error);
        }

        tracing::info!(
            sources = ?plan.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>(),
            force_refresh = force_refresh,
            "Starting discovery pass"
        );

        let total = plan.len();
        let mut discovered = Vec::new();
        let mut outcomes = BTreeMap::new();

        for (i, (source, adapter)) in plan.into_iter().enumerate() {
            self.progress
                .update(
                    op,
                    i as f64 / total as f64,
                    &format!("Discovering from {}", source),
                )
                .await;

            if !force_refresh && let Some(records) = self.cache.get_fresh(source).await {
                tracing::debug!(source = %source, count = records.len(), "Using cached discovery result");
                metrics::record_cache_hit(source);
                outcomes.insert(
                    source,
                    SourceOutcome::Cached {
                        records: records.len(),
                    },
                );
                discovered.extend(records);
                continue;
            }

            let result = match tokio::time::timeout(self.source_timeout, adapter.discover(known))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(self.source_timeout)),
            };

            match result {
                Ok(records) => {
                    tracing::info!(source = %source, count = records.len(), "Source discovered");
                    self.cache.insert(source, records.clone()).await;
                    outcomes.insert(
                        source,
                        SourceOutcome::Fetched {
                            records: records.len(),
                        },
                    );
                    discovered.extend(records);
                }
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "Source discovery failed");
                    metrics::record_source_failure(source);
                    outcomes.insert(
                        source,
                        SourceOutcome::Failed {
                            error: e.to_string(),
                        },
                    );
                }
            }
        }

        *self.last_outcomes.write().await = outcomes;

        metrics::record_discovery_pass(discovered.len());
        self.progress
            .complete(
                op,
                serde_json::json!(discovered.len()),
                &format!("Discovered {} models", discovered.len()),
            )
            .await;

        Ok(discovered)
    }
}
