//! Prometheus metrics

use crate::models::ModelSource;
use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Setup Prometheus metrics exporter
/// Returns a handle that can be used to render the current metrics
pub fn setup_metrics() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    tracing::info!("Prometheus metrics exporter installed");

    Ok(handle)
}

/// Record a completed discovery pass
pub fn record_discovery_pass(records: usize) {
    metrics::counter!("model_registry_discovery_passes_total").increment(1);
    metrics::histogram!("model_registry_discovery_records").record(records as f64);
}

/// Record an adapter call that failed or timed out
pub fn record_source_failure(source: ModelSource) {
    metrics::counter!("model_registry_source_failures_total",
        "source" => source.as_str()
    )
    .increment(1);
}

/// Record a source served from the discovery cache
pub fn record_cache_hit(source: ModelSource) {
    metrics::counter!("model_registry_cache_hits_total",
        "source" => source.as_str()
    )
    .increment(1);
}

/// Record a tracked usage event
pub fn record_usage_event(usage_type: &str) {
    metrics::counter!("model_registry_usage_events_total",
        "usage_type" => usage_type.to_string()
    )
    .increment(1);
}

/// Record a manifest write that failed
pub fn record_persist_failure() {
    metrics::counter!("model_registry_persist_failures_total").increment(1);
}

/// Update registered model count gauge
pub fn update_model_count(count: usize) {
    metrics::gauge!("model_registry_models_count").set(count as f64);
}
