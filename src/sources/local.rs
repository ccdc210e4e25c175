//! Local filesystem adapter
//!
//! Walks the models root for weight files. Layout is free-form:
//! ```text
//! ~/.model-registry/models/
//! ├── llama-2-7b-chat.Q4_K_M.gguf
//! ├── mistral/
//! │   └── mistral-7b-instruct.safetensors
//! └── my-finetune/
//!     ├── config.json
//!     └── pytorch_model.bin
//! ```

use super::{KnownModels, SourceAdapter};
use crate::error::SourceError;
use crate::models::{
    ModelFormat, ModelRecord, ModelSource, ModelType, infer_parameter_count, infer_quantization,
    parse_sidecar_config,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Extensions treated as model weights
pub const MODEL_EXTENSIONS: &[&str] = &["bin", "pt", "pth", "safetensors", "gguf", "onnx", "awq"];

/// Adapter producing `LocalFilesystem` records
pub struct LocalFilesystemAdapter {
    root: PathBuf,
}

impl LocalFilesystemAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Blocking walk of the models root
    fn scan(root: &Path, known: &KnownModels) -> Vec<ModelRecord> {
        if !root.is_dir() {
            tracing::debug!(root = ?root, "Models root does not exist");
            return Vec::new();
        }

        let mut records = Vec::new();
        let mut unchanged = 0usize;

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable path during scan");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(format) = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(ModelFormat::from_extension)
            else {
                continue;
            };

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = ?entry.path(), error = %e, "Skipping file without metadata");
                    continue;
                }
            };

            let id = format!("local:{}", relative_id(root, entry.path()));
            let modified: Option<DateTime<Utc>> = metadata.modified().ok().map(DateTime::from);

            if let (Some(known), Some(modified)) = (known.get(&id), modified)
                && known.last_updated == Some(modified)
            {
                unchanged += 1;
                continue;
            }

            records.push(build_record(
                id,
                root,
                &entry,
                format,
                metadata.len(),
                modified,
            ));
        }

        tracing::info!(
            root = ?root,
            discovered = records.len(),
            unchanged = unchanged,
            "Local filesystem scan complete"
        );

        records
    }
}

/// Path relative to the root with '/' separators on every platform
fn relative_id(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_record(
    id: String,
    root: &Path,
    entry: &DirEntry,
    format: ModelFormat,
    size_bytes: u64,
    modified: Option<DateTime<Utc>>,
) -> ModelRecord {
    let file_name = entry.file_name().to_string_lossy().to_string();
    let name = entry
        .path()
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.clone());

    let mut model_type = ModelType::infer_from_name(&file_name);
    let mut parameter_count = infer_parameter_count(&file_name);

    if (model_type == ModelType::Other || parameter_count.is_none())
        && let Some(sidecar) = entry.path().parent().and_then(parse_sidecar_config)
    {
        if model_type == ModelType::Other {
            model_type = sidecar.family();
        }
        if parameter_count.is_none() {
            parameter_count = sidecar.estimate_parameters();
        }
    }

    let version = format!(
        "{}-{}",
        size_bytes,
        modified.map(|m| m.timestamp_millis()).unwrap_or_default()
    );

    let mut record = ModelRecord::new(id, name, ModelSource::LocalFilesystem)
        .with_version(version)
        .with_type(model_type)
        .with_format(format)
        .with_path(entry.path().to_string_lossy().to_string())
        .with_tags(["local", format.as_str()]);

    if model_type != ModelType::Other {
        record.tags.insert(model_type.as_str().to_string());
    }

    record.size_bytes = Some(size_bytes);
    record.parameter_count = parameter_count;
    record.quantization = infer_quantization(&file_name);
    record.last_updated = modified;
    record
        .metadata
        .insert("relative_path".to_string(), relative_id(root, entry.path()));

    record
}

#[async_trait]
impl SourceAdapter for LocalFilesystemAdapter {
    fn source(&self) -> ModelSource {
        ModelSource::LocalFilesystem
    }

    async fn discover(&self, known: &KnownModels) -> Result<Vec<ModelRecord>, SourceError> {
        let root = self.root.clone();
        let known = known.clone();

        tokio::task::spawn_blocking(move || Self::scan(&root, &known))
            .await
            .map_err(|e| SourceError::Io(std::io::Error::other(e)))
    }
}
