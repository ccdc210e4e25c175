//! Best-effort metadata inference from model and file names
//!
//! These heuristics misfire on adversarial names (e.g. "4bit" also reads as a
//! 4B parameter count). Only source adapters call into this module.

use super::record::ModelFormat;
use regex::Regex;
use std::sync::LazyLock;

const BILLION: u64 = 1_000_000_000;

static QUANTIZATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"Q(\d+)_(\w+)", r"(\d+)bit", r"int(\d+)"]
        .iter()
        .map(|p| Regex::new(p).expect("static quantization pattern"))
        .collect()
});

static PARAMETER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)(\d+)b", r"(?i)(\d+)B", r"(?i)(\d+)[.-]?bil"]
        .iter()
        .map(|p| Regex::new(p).expect("static parameter pattern"))
        .collect()
});

/// Hub file extensions in format priority order
const FORMAT_PRIORITY: [(&str, ModelFormat); 5] = [
    (".safetensors", ModelFormat::SafeTensors),
    (".bin", ModelFormat::RawWeights),
    (".gguf", ModelFormat::Gguf),
    (".onnx", ModelFormat::Onnx),
    (".awq", ModelFormat::Awq),
];

/// Quantization label from the first matching pattern, e.g. "Q4_K_M" or "4bit"
pub fn infer_quantization(name: &str) -> Option<String> {
    QUANTIZATION_PATTERNS
        .iter()
        .find_map(|re| re.find(name))
        .map(|m| m.as_str().to_string())
}

/// Parameter count in units, from the first matching "<n>b" style pattern
pub fn infer_parameter_count(name: &str) -> Option<u64> {
    PARAMETER_PATTERNS.iter().find_map(|re| {
        re.captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|n| n.as_str().parse::<u64>().ok())
            .and_then(|n| n.checked_mul(BILLION))
    })
}

/// Format from the file names a hub entry advertises
///
/// Priority is by extension, not by file order: a repo carrying both
/// `model.safetensors` and `pytorch_model.bin` is SafeTensors.
pub fn infer_format_from_files<'a, I>(files: I) -> ModelFormat
where
    I: IntoIterator<Item = &'a str>,
{
    let files: Vec<String> = files.into_iter().map(str::to_ascii_lowercase).collect();
    FORMAT_PRIORITY
        .iter()
        .find(|(ext, _)| files.iter().any(|f| f.ends_with(ext)))
        .map(|(_, format)| *format)
        .unwrap_or(ModelFormat::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantization_gguf_style() {
        assert_eq!(
            infer_quantization("llama-2-7b-chat.Q4_K_M.gguf"),
            Some("Q4_K_M".to_string())
        );
    }

    #[test]
    fn test_quantization_bit_and_int() {
        assert_eq!(infer_quantization("falcon-7b-4bit"), Some("4bit".to_string()));
        assert_eq!(infer_quantization("t5-base-int8"), Some("int8".to_string()));
        assert_eq!(infer_quantization("gpt2"), None);
    }

    #[test]
    fn test_quantization_is_case_sensitive() {
        assert_eq!(infer_quantization("seq2_model"), None);
        assert_eq!(infer_quantization("llama-7b.q4_k_m.gguf"), None);
    }

    #[test]
    fn test_parameter_count() {
        assert_eq!(infer_parameter_count("Llama-2-13B-hf"), Some(13 * BILLION));
        assert_eq!(infer_parameter_count("mistral-7b"), Some(7 * BILLION));
        assert_eq!(infer_parameter_count("gpt2"), None);
    }

    #[test]
    fn test_parameter_count_overflow_is_none() {
        assert_eq!(infer_parameter_count("model-99999999999999999999b"), None);
    }

    #[test]
    fn test_format_priority() {
        let files = ["pytorch_model.bin", "config.json", "model.safetensors"];
        assert_eq!(infer_format_from_files(files), ModelFormat::SafeTensors);

        let files = ["model.Q4_0.gguf", "README.md"];
        assert_eq!(infer_format_from_files(files), ModelFormat::Gguf);

        let files = ["README.md"];
        assert_eq!(infer_format_from_files(files), ModelFormat::Other);
    }
}
