//! Manifest persistence for the registry snapshot

use crate::models::ModelRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

// ============================================================================
// Trait Definitions
// ============================================================================

/// Trait for storage backend operations
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Save content to a file path atomically
    async fn save(&self, path: &Path, content: &str) -> Result<()>;

    /// Load content from a file path
    /// Returns None if file doesn't exist
    async fn load(&self, path: &Path) -> Result<Option<String>>;

    /// Move a file aside
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

// ============================================================================
// Production Implementation
// ============================================================================

/// Production storage backend using tokio::fs
pub struct FileSystemStorage;

impl FileSystemStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileSystemStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for FileSystemStorage {
    async fn save(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create manifest directory: {:?}", parent))?;
        }

        // Whole-file replace: write to temp file, then rename
        let temp_file = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_file)
            .await
            .context("Failed to create temp manifest file")?;
        file.write_all(content.as_bytes())
            .await
            .context("Failed to write manifest file")?;
        file.sync_all()
            .await
            .context("Failed to sync manifest file")?;

        fs::rename(&temp_file, path)
            .await
            .context("Failed to rename temp manifest file")?;

        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read manifest file: {:?}", path))?;

        // Invalid UTF-8 is a parse problem for the caller, not a read failure
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)
            .await
            .with_context(|| format!("Failed to rename {:?} to {:?}", from, to))
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Everything the manifest holds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub models: BTreeMap<String, ModelRecord>,
    /// Source name -> time of its last successful discovery
    #[serde(default, deserialize_with = "deserialize_discovery_times")]
    pub last_discovery: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.last_discovery.is_empty()
    }
}

/// Older manifests wrote unix seconds instead of RFC 3339 strings
#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampRepr {
    Iso(DateTime<Utc>),
    Unix(f64),
}

fn deserialize_discovery_times<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, TimestampRepr>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(source, ts)| {
            let ts = match ts {
                TimestampRepr::Iso(dt) => Some(dt),
                TimestampRepr::Unix(secs) => DateTime::from_timestamp(
                    secs.trunc() as i64,
                    (secs.fract() * 1e9) as u32,
                ),
            };
            ts.map(|ts| (source, ts))
        })
        .collect())
}

// ============================================================================
// Manifest Store
// ============================================================================

/// Passive serializer for the registry snapshot
///
/// Holds no state besides the file location; the registry decides when to
/// save and serializes calls under its mutation lock.
pub struct ManifestStore {
    manifest_file: PathBuf,
    storage: Arc<dyn StorageBackend>,
}

impl ManifestStore {
    /// Create a store with a custom storage backend
    pub fn new_with_storage(manifest_file: PathBuf, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            manifest_file,
            storage,
        }
    }

    /// Create a store with default filesystem storage
    pub fn new(manifest_file: PathBuf) -> Self {
        Self::new_with_storage(manifest_file, Arc::new(FileSystemStorage::new()))
    }

    pub fn path(&self) -> &Path {
        &self.manifest_file
    }

    /// Load the snapshot
    ///
    /// Never fails: a missing file is a first run, and an unparseable file is
    /// moved to `<name>.bak.<unixtime>` before starting empty.
    pub async fn load(&self) -> RegistrySnapshot {
        let content = match self.storage.load(&self.manifest_file).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                tracing::info!(path = ?self.manifest_file, "No manifest found, starting fresh");
                return RegistrySnapshot::default();
            }
            Err(e) => {
                tracing::error!(
                    path = ?self.manifest_file,
                    error = %e,
                    "Failed to read manifest, starting with empty registry"
                );
                return RegistrySnapshot::default();
            }
        };

        match serde_json::from_str::<RegistrySnapshot>(&content) {
            Ok(snapshot) => {
                tracing::info!(
                    models = snapshot.models.len(),
                    last_updated = %snapshot.last_updated,
                    "Manifest loaded from disk"
                );
                snapshot
            }
            Err(e) => {
                tracing::warn!(
                    path = ?self.manifest_file,
                    error = %e,
                    "Manifest is corrupted, moving it aside"
                );
                self.backup_corrupted().await;
                RegistrySnapshot::default()
            }
        }
    }

    /// Write the whole snapshot, replacing the previous manifest
    pub async fn save(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialize manifest to JSON")?;

        self.storage.save(&self.manifest_file, &json).await?;

        tracing::debug!(
            path = ?self.manifest_file,
            models = snapshot.models.len(),
            "Manifest saved"
        );

        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let file_name = self
            .manifest_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "model_registry.json".to_string());
        let backup_name = format!("{}.bak.{}", file_name, Utc::now().timestamp());
        self.manifest_file.with_file_name(backup_name)
    }

    async fn backup_corrupted(&self) {
        let backup = self.backup_path();
        match self.storage.rename(&self.manifest_file, &backup).await {
            Ok(()) => tracing::warn!(backup = ?backup, "Corrupted manifest backed up"),
            Err(e) => tracing::error!(error = %e, "Failed to back up corrupted manifest"),
        }
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================
