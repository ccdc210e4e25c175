//! Thread-safe model registry

use crate::config::RegistryConfig;
use crate::discovery::DiscoveryEngine;
use crate::error::RegistryResult;
use crate::metrics;
use crate::models::{ModelRecord, ModelSource};
use crate::progress::OperationTracker;
use crate::search::SearchQuery;
use crate::sources::KnownModels;
use crate::state::{ManifestStore, RegistrySnapshot};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock, broadcast};

/// Events that occur during the registry lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// Record was inserted or replaced
    Registered(String),
    /// Record was removed
    Unregistered(String),
    /// A discovery pass merged its records
    DiscoveryCompleted { discovered: usize },
}

/// Catalog of model records backed by a JSON manifest
///
/// Construct once and share as `Arc<Registry>`. Reads take the record lock;
/// every mutation also holds the mutation lock until the manifest is written.
pub struct Registry {
    models: Arc<RwLock<BTreeMap<String, ModelRecord>>>,
    last_discovery: RwLock<BTreeMap<String, DateTime<Utc>>>,
    mutation: Mutex<()>,
    engine: DiscoveryEngine,
    store: ManifestStore,
    event_tx: broadcast::Sender<RegistryEvent>,
}

impl Registry {
    /// Open the registry described by `config`
    ///
    /// Creates the configured directories, loads the manifest (recovering from
    /// corruption) and wires the production adapters.
    pub async fn open(config: &RegistryConfig) -> RegistryResult<Self> {
        config.validate()?;

        let store = ManifestStore::new(config.manifest_path());
        let engine = DiscoveryEngine::from_config(config, Arc::new(OperationTracker::new()));

        Ok(Self::with_parts(store, engine).await)
    }

    /// Build a registry from explicit parts, loading the store's snapshot
    pub async fn with_parts(store: ManifestStore, engine: DiscoveryEngine) -> Self {
        let snapshot = store.load().await;
        metrics::update_model_count(snapshot.models.len());
        if snapshot.is_empty() {
            tracing::debug!(manifest = ?store.path(), "Starting from an empty manifest");
        }

        tracing::info!(
            manifest = ?store.path(),
            models = snapshot.models.len(),
            sources = ?engine.sources(),
            "Registry opened"
        );

        let (event_tx, _) = broadcast::channel(100);

        Self {
            models: Arc::new(RwLock::new(snapshot.models)),
            last_discovery: RwLock::new(snapshot.last_discovery),
            mutation: Mutex::new(()),
            engine,
            store,
            event_tx,
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    pub fn engine(&self) -> &DiscoveryEngine {
        &self.engine
    }

    pub fn progress(&self) -> &Arc<OperationTracker> {
        self.engine.progress()
    }

    pub fn manifest_path(&self) -> &Path {
        self.store.path()
    }

    /// Insert or replace a record by id
    ///
    /// Returns whether the manifest was written. The in-memory record is kept
    /// either way.
    pub async fn register(&self, record: ModelRecord) -> bool {
        let guard = self.mutation.lock().await;
        let id = record.id.clone();

        {
            let mut models = self.models.write().await;
            models.insert(id.clone(), record);
            metrics::update_model_count(models.len());
        }

        tracing::info!(model_id = %id, "Model registered");
        let _ = self.event_tx.send(RegistryEvent::Registered(id));

        self.persist(&guard).await
    }

    /// Remove a record by id
    ///
    /// Returns false without touching the manifest when the id is unknown.
    pub async fn unregister(&self, id: &str) -> bool {
        let guard = self.mutation.lock().await;

        {
            let mut models = self.models.write().await;
            if models.remove(id).is_none() {
                tracing::debug!(model_id = %id, "Unregister of unknown model");
                return false;
            }
            metrics::update_model_count(models.len());
        }

        tracing::info!(model_id = %id, "Model unregistered");
        let _ = self
            .event_tx
            .send(RegistryEvent::Unregistered(id.to_string()));

        self.persist(&guard).await
    }

    /// Get record by id
    pub async fn get(&self, id: &str) -> Option<ModelRecord> {
        self.models.read().await.get(id).cloned()
    }

    /// All records, ordered by id
    pub async fn list(&self) -> Vec<ModelRecord> {
        self.models.read().await.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.models.read().await.len()
    }

    /// Records matching every criterion of `query`, ordered by id
    pub async fn search(&self, query: &SearchQuery) -> Vec<ModelRecord> {
        self.models
            .read()
            .await
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect()
    }

    /// Per-source time of the last successful adapter fetch
    pub async fn last_discovery(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.last_discovery.read().await.clone()
    }

    /// Run a discovery pass and merge its records
    ///
    /// Adapter I/O happens without the mutation lock; only the merge and the
    /// single manifest write hold it.
    pub async fn discover(
        &self,
        sources: Option<&[ModelSource]>,
        force_refresh: bool,
    ) -> RegistryResult<Vec<ModelRecord>> {
        let known = KnownModels::from_records(self.models.read().await.values());

        let discovered = self.engine.discover(sources, force_refresh, &known).await?;
        let fetched_at = self.engine.cache_timestamps().await;

        let guard = self.mutation.lock().await;

        {
            let mut models = self.models.write().await;
            for record in &discovered {
                models.insert(record.id.clone(), record.clone());
            }
            metrics::update_model_count(models.len());
        }

        {
            let mut last_discovery = self.last_discovery.write().await;
            for (source, at) in fetched_at {
                last_discovery.insert(source.as_str().to_string(), at);
            }
        }

        tracing::info!(discovered = discovered.len(), "Discovery merged into registry");
        let _ = self.event_tx.send(RegistryEvent::DiscoveryCompleted {
            discovered: discovered.len(),
        });

        self.persist(&guard).await;

        Ok(discovered)
    }

    /// Discovered records whose version differs from the one registered
    /// before the pass
    ///
    /// Ids that were not registered yet are new models, not updates.
    pub async fn check_for_updates(&self) -> RegistryResult<BTreeMap<String, ModelRecord>> {
        let before: HashMap<String, String> = self
            .models
            .read()
            .await
            .values()
            .map(|r| (r.id.clone(), r.version.clone()))
            .collect();

        let discovered = self.discover(None, false).await?;

        let updates: BTreeMap<String, ModelRecord> = discovered
            .into_iter()
            .filter(|r| before.get(&r.id).is_some_and(|v| *v != r.version))
            .map(|r| (r.id.clone(), r))
            .collect();

        tracing::info!(updates = updates.len(), "Update check complete");

        Ok(updates)
    }

    /// Copy a record's local file to `destination`
    ///
    /// A directory destination receives the file under its own name.
    pub async fn share(&self, id: &str, destination: &Path) -> bool {
        let Some(record) = self.get(id).await else {
            tracing::warn!(model_id = %id, "Cannot share unknown model");
            return false;
        };

        let Some(path) = record.path.as_deref().map(Path::new) else {
            tracing::warn!(model_id = %id, "Model has no local path to share");
            return false;
        };

        if !tokio::fs::metadata(path)
            .await
            .is_ok_and(|metadata| metadata.is_file())
        {
            tracing::warn!(model_id = %id, path = ?path, "Model file is missing");
            return false;
        }

        let is_dir = tokio::fs::metadata(destination)
            .await
            .is_ok_and(|metadata| metadata.is_dir());
        let target = match (is_dir, path.file_name()) {
            (true, Some(file_name)) => destination.join(file_name),
            _ => destination.to_path_buf(),
        };

        match tokio::fs::copy(path, &target).await {
            Ok(bytes) => {
                tracing::info!(model_id = %id, target = ?target, bytes = bytes, "Model shared");
                true
            }
            Err(e) => {
                tracing::warn!(model_id = %id, target = ?target, error = %e, "Failed to share model");
                false
            }
        }
    }

    /// Write the manifest now
    pub async fn save(&self) -> bool {
        let guard = self.mutation.lock().await;
        self.persist(&guard).await
    }

    /// Serialize current state to the manifest
    ///
    /// Takes the mutation guard so the manifest is only ever written under it.
    async fn persist(&self, _guard: &MutexGuard<'_, ()>) -> bool {
        let snapshot = RegistrySnapshot {
            models: self.models.read().await.clone(),
            last_discovery: self.last_discovery.read().await.clone(),
            last_updated: Utc::now(),
        };

        match self.store.save(&snapshot).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    path = ?self.store.path(),
                    error = %e,
                    "Failed to persist registry; in-memory state kept"
                );
                metrics::record_persist_failure();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryCache;
    use crate::state::mocks::MockStorage;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    const MANIFEST: &str = "/registry/model_registry.json";

    fn empty_engine() -> DiscoveryEngine {
        DiscoveryEngine::new(
            DiscoveryCache::new(Duration::from_secs(60)),
            Duration::from_secs(5),
            Arc::new(OperationTracker::new()),
        )
    }

    async fn registry_with(storage: Arc<MockStorage>) -> Registry {
        let store = ManifestStore::new_with_storage(PathBuf::from(MANIFEST), storage);
        Registry::with_parts(store, empty_engine()).await
    }

    fn record(id: &str, version: &str) -> ModelRecord {
        ModelRecord::new(id, id, ModelSource::RemoteHub).with_version(version)
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let storage = Arc::new(MockStorage::new());
        let registry = registry_with(storage.clone()).await;

        assert!(registry.register(record("b/model", "1")).await);
        assert!(registry.register(record("a/model", "1")).await);

        assert_eq!(registry.count().await, 2);
        assert_eq!(registry.get("a/model").await.unwrap().version, "1");
        let ids: Vec<_> = registry.list().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a/model", "b/model"]);

        let manifest = storage.get_file(Path::new(MANIFEST)).await.unwrap();
        assert!(manifest.contains("a/model"));
    }

    #[tokio::test]
    async fn test_register_replaces_by_id() {
        let registry = registry_with(Arc::new(MockStorage::new())).await;
        registry.register(record("m1", "1.0")).await;
        registry.register(record("m1", "2.0")).await;

        assert_eq!(registry.count().await, 1);
        assert_eq!(registry.get("m1").await.unwrap().version, "2.0");
    }

    #[tokio::test]
    async fn test_unregister_unknown_has_no_side_effects() {
        let storage = Arc::new(MockStorage::new());
        let registry = registry_with(storage.clone()).await;

        assert!(!registry.unregister("missing").await);
        assert!(storage.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_removes_and_persists() {
        let storage = Arc::new(MockStorage::new());
        let registry = registry_with(storage.clone()).await;
        registry.register(record("m1", "1.0")).await;

        assert!(registry.unregister("m1").await);
        assert!(registry.get("m1").await.is_none());

        let manifest = storage.get_file(Path::new(MANIFEST)).await.unwrap();
        assert!(!manifest.contains("m1"));
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory() {
        let storage = Arc::new(MockStorage::new());
        let registry = registry_with(storage.clone()).await;

        storage.set_save_error("disk full".to_string()).await;
        assert!(!registry.register(record("m1", "1.0")).await);
        assert!(registry.get("m1").await.is_some());

        // Error injection is one-shot
        assert!(registry.save().await);
    }

    #[tokio::test]
    async fn test_reopen_restores_records() {
        let storage = Arc::new(MockStorage::new());
        {
            let registry = registry_with(storage.clone()).await;
            registry.register(record("m1", "1.0")).await;
        }

        let registry = registry_with(storage).await;
        assert_eq!(registry.get("m1").await.unwrap().version, "1.0");
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let registry = registry_with(Arc::new(MockStorage::new())).await;
        let mut events = registry.subscribe_events();

        registry.register(record("m1", "1.0")).await;
        registry.unregister("m1").await;

        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Registered("m1".to_string())
        );
        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Unregistered("m1".to_string())
        );
    }

    #[tokio::test]
    async fn test_share_copies_into_directory() {
        let dir = TempDir::new().unwrap();
        let weights = dir.path().join("tiny.gguf");
        std::fs::write(&weights, b"weights").unwrap();
        let dest = dir.path().join("out");
        std::fs::create_dir(&dest).unwrap();

        let registry = registry_with(Arc::new(MockStorage::new())).await;
        registry
            .register(
                ModelRecord::new("local:tiny.gguf", "tiny", ModelSource::LocalFilesystem)
                    .with_path(weights.to_string_lossy()),
            )
            .await;

        assert!(registry.share("local:tiny.gguf", &dest).await);
        assert_eq!(std::fs::read(dest.join("tiny.gguf")).unwrap(), b"weights");

        let explicit = dir.path().join("copy.bin");
        assert!(registry.share("local:tiny.gguf", &explicit).await);
        assert!(explicit.is_file());
    }

    #[tokio::test]
    async fn test_share_failures() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with(Arc::new(MockStorage::new())).await;

        registry.register(record("remote/only", "1")).await;
        registry
            .register(
                ModelRecord::new("local:gone.bin", "gone", ModelSource::LocalFilesystem)
                    .with_path(dir.path().join("gone.bin").to_string_lossy()),
            )
            .await;

        assert!(!registry.share("unknown", dir.path()).await);
        assert!(!registry.share("remote/only", dir.path()).await);
        assert!(!registry.share("local:gone.bin", dir.path()).await);
    }

    #[tokio::test]
    async fn test_search_delegates_to_query() {
        let registry = registry_with(Arc::new(MockStorage::new())).await;
        registry
            .register(record("org/llama-7b", "1").with_tags(["chat"]))
            .await;
        registry.register(record("org/mistral-7b", "1")).await;

        let hits = registry
            .search(&SearchQuery::new().with_text("llama").with_tags(["chat"]))
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "org/llama-7b");
    }
}
