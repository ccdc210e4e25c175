//! Tracing subscriber setup

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `level` is an env-filter directive (`info`, `model_registry=debug`, ...).
/// `format` is `json` or `pretty`; anything else falls back to json.
/// Fails if a global subscriber is already set.
pub fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", level, e))?;

    let result = match format {
        "pretty" => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_subscriber_installs_once() {
        assert!(init_logging("model_registry=debug", "pretty").is_ok());
        assert!(init_logging("info", "json").is_err());
    }
}
