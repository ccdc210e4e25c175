//! Configuration structures and loading logic

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Registry configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Root scanned by the local filesystem adapter
    pub models_dir: PathBuf,
    /// Holds the manifest, custom sources file and usage events
    pub registry_dir: PathBuf,
    pub cache_ttl_secs: u64,
    /// Upper bound for a single source within a discovery pass
    pub source_timeout_secs: u64,
    /// Timeout for individual HTTP requests
    pub http_timeout_secs: u64,
    pub hub_endpoint: String,
    /// One hub search per keyword
    pub hub_keywords: Vec<String>,
    pub hub_limit_per_keyword: usize,
    pub log_level: String,
    /// `json` or `pretty`
    pub log_format: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            registry_dir: default_registry_dir(),
            cache_ttl_secs: default_cache_ttl(),
            source_timeout_secs: default_source_timeout(),
            http_timeout_secs: default_http_timeout(),
            hub_endpoint: default_hub_endpoint(),
            hub_keywords: default_hub_keywords(),
            hub_limit_per_keyword: default_hub_limit(),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        // Environment variable overrides
        if let Ok(dir) = std::env::var("MODEL_REGISTRY_MODELS_DIR") {
            config.models_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("MODEL_REGISTRY_DIR") {
            config.registry_dir = PathBuf::from(dir);
        }
        if let Ok(ttl) = std::env::var("MODEL_REGISTRY_CACHE_TTL_SECS") {
            config.cache_ttl_secs = ttl
                .parse()
                .context("Invalid MODEL_REGISTRY_CACHE_TTL_SECS value")?;
        }
        if let Ok(endpoint) = std::env::var("MODEL_REGISTRY_HUB_ENDPOINT") {
            config.hub_endpoint = endpoint;
        }

        Ok(config)
    }

    /// Validate configuration and create the directories it names
    pub fn validate(&self) -> Result<()> {
        if self.source_timeout_secs == 0 {
            anyhow::bail!("source_timeout_secs must be > 0");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be > 0");
        }
        if self.hub_limit_per_keyword == 0 {
            anyhow::bail!("hub_limit_per_keyword must be > 0");
        }
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            anyhow::bail!(
                "log_format must be 'json' or 'pretty' (got '{}')",
                self.log_format
            );
        }

        for dir in [&self.models_dir, &self.registry_dir, &self.usage_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Cannot create directory: {:?}", dir))?;
            }
        }

        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.registry_dir.join("model_registry.json")
    }

    pub fn custom_sources_path(&self) -> PathBuf {
        self.registry_dir.join("custom_sources.json")
    }

    pub fn usage_dir(&self) -> PathBuf {
        self.registry_dir.join("usage")
    }
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".model-registry"))
        .unwrap_or_else(|| PathBuf::from("/tmp/model-registry"))
}

// Default functions
fn default_models_dir() -> PathBuf {
    base_dir().join("models")
}
fn default_registry_dir() -> PathBuf {
    base_dir().join("registry")
}
fn default_cache_ttl() -> u64 {
    3600
}
fn default_source_timeout() -> u64 {
    120
}
fn default_http_timeout() -> u64 {
    30
}
fn default_hub_endpoint() -> String {
    "https://huggingface.co".to_string()
}
fn default_hub_keywords() -> Vec<String> {
    crate::models::ModelType::FAMILIES
        .iter()
        .map(|t| t.as_str().to_string())
        .collect()
}
fn default_hub_limit() -> usize {
    10
}
