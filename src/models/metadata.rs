//! Sidecar `config.json` parsing
//!
//! Local weight files often sit next to a HuggingFace-style config.json. When
//! present it gives a more reliable family than the file name and enough
//! dimensions for a rough parameter estimate.

use super::record::ModelType;
use serde::Deserialize;
use std::path::Path;

/// Fields of config.json relevant to cataloging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidecarConfig {
    pub model_type: Option<String>,
    pub hidden_size: Option<u64>,
    pub vocab_size: Option<u64>,
    pub num_hidden_layers: Option<u64>,
}

/// Raw config.json structure (partial)
#[derive(Debug, Deserialize)]
struct RawConfig {
    model_type: Option<String>,
    hidden_size: Option<u64>,
    vocab_size: Option<u64>,
    num_hidden_layers: Option<u64>,
    // GPT-2 / T5 style names
    d_model: Option<u64>,
    n_embd: Option<u64>,
    n_layer: Option<u64>,
    num_layers: Option<u64>,
}

impl SidecarConfig {
    /// Family named by `model_type`, if it is one we know
    pub fn family(&self) -> ModelType {
        self.model_type
            .as_deref()
            .map(ModelType::parse)
            .unwrap_or(ModelType::Other)
    }

    /// Rough transformer estimate: embeddings plus 12 * hidden^2 per layer
    pub fn estimate_parameters(&self) -> Option<u64> {
        let hidden = self.hidden_size?;
        let layers = self.num_hidden_layers?;
        let vocab = self.vocab_size?;

        let embedding_params = vocab.checked_mul(hidden)?;
        let layer_params = layers.checked_mul(12)?.checked_mul(hidden)?.checked_mul(hidden)?;
        embedding_params.checked_add(layer_params)
    }
}

/// Parse `config.json` in `dir`
///
/// Returns `None` if the file is missing or not valid JSON.
pub fn parse_sidecar_config(dir: &Path) -> Option<SidecarConfig> {
    let config_path = dir.join("config.json");
    if !config_path.is_file() {
        return None;
    }

    let content = std::fs::read_to_string(&config_path).ok()?;
    let raw: RawConfig = match serde_json::from_str(&content) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(path = ?config_path, error = %e, "Ignoring unparseable config.json");
            return None;
        }
    };

    Some(SidecarConfig {
        model_type: raw.model_type,
        hidden_size: raw.hidden_size.or(raw.d_model).or(raw.n_embd),
        vocab_size: raw.vocab_size,
        num_hidden_layers: raw.num_hidden_layers.or(raw.n_layer).or(raw.num_layers),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join("config.json"), content).unwrap();
    }

    #[test]
    fn test_parse_llama_config() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"{
                "model_type": "llama",
                "hidden_size": 4096,
                "vocab_size": 32000,
                "num_hidden_layers": 32
            }"#,
        );

        let config = parse_sidecar_config(dir.path()).unwrap();
        assert_eq!(config.family(), ModelType::Llama);
        assert_eq!(config.hidden_size, Some(4096));

        // ~6.5B for a 7B-class config
        let params = config.estimate_parameters().unwrap();
        assert!(params > 6_000_000_000);
        assert!(params < 7_000_000_000);
    }

    #[test]
    fn test_parse_config_with_alternative_names() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"{"model_type": "gpt2", "n_embd": 768, "n_layer": 12, "vocab_size": 50257}"#,
        );

        let config = parse_sidecar_config(dir.path()).unwrap();
        assert_eq!(config.family(), ModelType::Gpt2);
        assert_eq!(config.hidden_size, Some(768));
        assert_eq!(config.num_hidden_layers, Some(12));
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        assert!(parse_sidecar_config(dir.path()).is_none());
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "not valid json");
        assert!(parse_sidecar_config(dir.path()).is_none());
    }

    #[test]
    fn test_unknown_family_and_incomplete_dimensions() {
        let config = SidecarConfig {
            model_type: Some("bert".to_string()),
            hidden_size: Some(384),
            ..Default::default()
        };
        assert_eq!(config.family(), ModelType::Other);
        assert!(config.estimate_parameters().is_none());
    }
}
