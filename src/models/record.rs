//! Catalog records and their enumerated classifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Origin of a model record
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// Remote model hub (HuggingFace)
    RemoteHub,
    /// Weight files found under the local models root
    LocalFilesystem,
    /// User-configured HTTP manifest
    Custom,
    /// Anything a newer or older manifest wrote that we don't recognize
    #[default]
    #[serde(other)]
    Unknown,
}

impl ModelSource {
    /// Sources that can back a discovery adapter, in processing order
    pub const DISCOVERABLE: [ModelSource; 3] = [Self::RemoteHub, Self::LocalFilesystem, Self::Custom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteHub => "remote_hub",
            Self::LocalFilesystem => "local_filesystem",
            Self::Custom => "custom",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model family, inferred best-effort from names and configs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Llama,
    Mistral,
    Phi,
    Falcon,
    Mpt,
    Gpt2,
    T5,
    #[default]
    #[serde(other)]
    Other,
}

impl ModelType {
    /// Known families in matching priority order (excludes `Other`)
    pub const FAMILIES: [ModelType; 7] = [
        Self::Llama,
        Self::Mistral,
        Self::Phi,
        Self::Falcon,
        Self::Mpt,
        Self::Gpt2,
        Self::T5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llama => "llama",
            Self::Mistral => "mistral",
            Self::Phi => "phi",
            Self::Falcon => "falcon",
            Self::Mpt => "mpt",
            Self::Gpt2 => "gpt2",
            Self::T5 => "t5",
            Self::Other => "other",
        }
    }

    /// Parse a family name, case-insensitively; unrecognized values become `Other`
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        Self::FAMILIES
            .into_iter()
            .find(|family| family.as_str() == value)
            .unwrap_or(Self::Other)
    }

    /// First family whose name occurs in `text`, case-insensitively
    pub fn infer_from_name(text: &str) -> Self {
        let text = text.to_ascii_lowercase();
        Self::FAMILIES
            .into_iter()
            .find(|family| text.contains(family.as_str()))
            .unwrap_or(Self::Other)
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk weight format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// PyTorch pickles (.bin, .pt, .pth)
    RawWeights,
    SafeTensors,
    Gguf,
    Onnx,
    Awq,
    #[default]
    #[serde(other)]
    Other,
}

impl ModelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawWeights => "raw_weights",
            Self::SafeTensors => "safe_tensors",
            Self::Gguf => "gguf",
            Self::Onnx => "onnx",
            Self::Awq => "awq",
            Self::Other => "other",
        }
    }

    /// Map a file extension (without the dot) to a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "bin" | "pt" | "pth" => Some(Self::RawWeights),
            "safetensors" => Some(Self::SafeTensors),
            "gguf" => Some(Self::Gguf),
            "onnx" => Some(Self::Onnx),
            "awq" => Some(Self::Awq),
            _ => None,
        }
    }

    /// Parse a format name as written in custom manifests
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "raw_weights" | "rawweights" | "pytorch" | "bin" | "pt" | "pth" => Self::RawWeights,
            "safe_tensors" | "safetensors" => Self::SafeTensors,
            "gguf" => Self::Gguf,
            "onnx" => Self::Onnx,
            "awq" => Self::Awq,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Registry-unique id (`org/name`, `local:<path>` or `custom:<source>:<id>`)
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Opaque version token; only equality is meaningful
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub source: ModelSource,
    #[serde(default)]
    pub model_type: ModelType,
    #[serde(default)]
    pub format: ModelFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ModelRecord {
    /// Create a record with only identity fields set
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: ModelSource) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            version: String::new(),
            source,
            model_type: ModelType::Other,
            format: ModelFormat::Other,
            path: None,
            url: None,
            size_bytes: None,
            parameter_count: None,
            quantization: None,
            last_updated: None,
            tags: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Whether the record points at something a caller can fetch or open
    pub fn is_actionable(&self) -> bool {
        self.path.is_some() || self.url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_parse() {
        assert_eq!(ModelType::parse("LLAMA"), ModelType::Llama);
        assert_eq!(ModelType::parse(" gpt2 "), ModelType::Gpt2);
        assert_eq!(ModelType::parse("bert"), ModelType::Other);
        assert_eq!(ModelType::parse(""), ModelType::Other);
    }

    #[test]
    fn test_model_type_infer_first_match_wins() {
        assert_eq!(
            ModelType::infer_from_name("Mistral-7B-Instruct.gguf"),
            ModelType::Mistral
        );
        // "llama" precedes "mistral" in priority order
        assert_eq!(
            ModelType::infer_from_name("llama-mistral-merge.bin"),
            ModelType::Llama
        );
        assert_eq!(ModelType::infer_from_name("resnet50.onnx"), ModelType::Other);
    }

    #[test]
    fn test_model_format_from_extension() {
        assert_eq!(ModelFormat::from_extension("PTH"), Some(ModelFormat::RawWeights));
        assert_eq!(
            ModelFormat::from_extension("safetensors"),
            Some(ModelFormat::SafeTensors)
        );
        assert_eq!(ModelFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_model_format_parse_aliases() {
        assert_eq!(ModelFormat::parse("SafeTensors"), ModelFormat::SafeTensors);
        assert_eq!(ModelFormat::parse("pytorch"), ModelFormat::RawWeights);
        assert_eq!(ModelFormat::parse("tflite"), ModelFormat::Other);
    }

    #[test]
    fn test_unknown_enum_strings_degrade() {
        let json = r#"{
            "id": "x",
            "name": "x",
            "version": "1",
            "source": "carrier_pigeon",
            "model_type": "mamba",
            "format": "tflite"
        }"#;
        let record: ModelRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source, ModelSource::Unknown);
        assert_eq!(record.model_type, ModelType::Other);
        assert_eq!(record.format, ModelFormat::Other);
    }

    #[test]
    fn test_record_serialize_skips_empty_options() {
        let record = ModelRecord::new("a/b", "b", ModelSource::RemoteHub).with_version("abc");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"source\":\"remote_hub\""));
        assert!(!json.contains("description"));
        assert!(!json.contains("size_bytes"));
    }

    #[test]
    fn test_is_actionable() {
        let record = ModelRecord::new("a", "a", ModelSource::Custom);
        assert!(!record.is_actionable());
        assert!(record.clone().with_url("https://example.com/a").is_actionable());
        assert!(record.with_path("/models/a.gguf").is_actionable());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(ModelSource::RemoteHub.to_string(), "remote_hub");
        assert_eq!(ModelSource::LocalFilesystem.to_string(), "local_filesystem");
        assert_eq!(ModelSource::Custom.to_string(), "custom");
        assert_eq!(ModelSource::Unknown.to_string(), "unknown");
    }
}
