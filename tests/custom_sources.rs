//! Custom HTTP manifest sources served by an in-process axum server

use axum::{Json, Router, http::StatusCode, routing::get};
use model_registry::sources::CustomHttpAdapter;
use model_registry::{
    DiscoveryCache, DiscoveryEngine, KnownModels, ManifestStore, ModelFormat, ModelSource,
    ModelType, OperationTracker, Registry, SourceAdapter, SourceOutcome,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Start a manifest server and return its address
async fn start_manifest_server() -> SocketAddr {
    let app = Router::new()
        .route(
            "/good.json",
            get(|| async {
                Json(json!({
                    "models": [
                        {
                            "id": "m1",
                            "name": "Team Llama",
                            "version": "1.0",
                            "type": "llama",
                            "format": "gguf",
                            "url": "https://models.example.com/m1.gguf",
                            "size_bytes": 4096,
                            "tags": ["team"],
                            "metadata": {"owner": "ml"}
                        },
                        {
                            "id": "m2",
                            "name": "Mystery",
                            "version": "0.1",
                            "type": "sparkly",
                            "format": "pickle"
                        },
                        {
                            "name": "entry without an id"
                        }
                    ]
                }))
            }),
        )
        .route(
            "/broken.json",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream down") }),
        )
        .route("/garbage.json", get(|| async { "not json at all" }))
        .route(
            "/hang.json",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Json(json!({"models": []}))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn write_sources(dir: &TempDir, addr: SocketAddr) -> std::path::PathBuf {
    let path = dir.path().join("custom_sources.json");
    let sources = json!({
        "sources": [
            {"name": "team", "url": format!("http://{addr}/good.json"), "enabled": true},
            {"name": "flaky", "url": format!("http://{addr}/broken.json"), "enabled": true},
            {"name": "noise", "url": format!("http://{addr}/garbage.json"), "enabled": true},
            {"name": "off", "url": format!("http://{addr}/good.json"), "enabled": false}
        ]
    });
    std::fs::write(&path, serde_json::to_string_pretty(&sources).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn test_enabled_sources_are_fetched_and_failures_isolated() {
    let addr = start_manifest_server().await;
    let dir = TempDir::new().unwrap();
    let path = write_sources(&dir, addr);

    let adapter = CustomHttpAdapter::new(path, Duration::from_secs(5));
    let mut records = adapter.discover(&KnownModels::new()).await.unwrap();
    records.sort_by(|a, b| a.id.cmp(&b.id));

    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["custom:team:m1", "custom:team:m2"]);

    let m1 = &records[0];
    assert_eq!(m1.source, ModelSource::Custom);
    assert_eq!(m1.model_type, ModelType::Llama);
    assert_eq!(m1.format, ModelFormat::Gguf);
    assert_eq!(m1.size_bytes, Some(4096));
    assert_eq!(m1.metadata.get("owner").map(String::as_str), Some("ml"));
    assert!(m1.is_actionable());

    let m2 = &records[1];
    assert_eq!(m2.model_type, ModelType::Other);
    assert_eq!(m2.format, ModelFormat::Other);
}

#[tokio::test]
async fn test_custom_records_flow_into_registry() {
    let addr = start_manifest_server().await;
    let dir = TempDir::new().unwrap();
    let path = write_sources(&dir, addr);

    let engine = DiscoveryEngine::new(
        DiscoveryCache::new(Duration::from_secs(60)),
        Duration::from_secs(10),
        Arc::new(OperationTracker::new()),
    )
    .with_adapter(Arc::new(CustomHttpAdapter::new(path, Duration::from_secs(5))));
    let store = ManifestStore::new(dir.path().join("model_registry.json"));
    let registry = Registry::with_parts(store, engine).await;

    let discovered = registry
        .discover(Some(&[ModelSource::Custom]), false)
        .await
        .unwrap();
    assert_eq!(discovered.len(), 2);
    assert_eq!(
        registry.get("custom:team:m1").await.unwrap().name,
        "Team Llama"
    );

    let manifest = std::fs::read_to_string(dir.path().join("model_registry.json")).unwrap();
    assert!(manifest.contains("custom:team:m1"));
    assert!(manifest.contains("\"custom\""));
}

#[tokio::test]
async fn test_hung_sources_do_not_starve_healthy_ones() {
    let addr = start_manifest_server().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom_sources.json");

    // Four 1s client timeouts in sequence would fill the 4s engine budget
    let mut sources: Vec<_> = (0..4)
        .map(|i| json!({"name": format!("stuck-{i}"), "url": format!("http://{addr}/hang.json")}))
        .collect();
    sources.push(json!({"name": "team", "url": format!("http://{addr}/good.json")}));
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&json!({ "sources": sources })).unwrap(),
    )
    .unwrap();

    let engine = DiscoveryEngine::new(
        DiscoveryCache::new(Duration::from_secs(60)),
        Duration::from_secs(4),
        Arc::new(OperationTracker::new()),
    )
    .with_adapter(Arc::new(CustomHttpAdapter::new(path, Duration::from_secs(1))));

    let records = engine
        .discover(Some(&[ModelSource::Custom]), false, &KnownModels::new())
        .await
        .unwrap();

    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["custom:team:m1", "custom:team:m2"]);
    assert_eq!(
        engine.last_outcomes().await.get(&ModelSource::Custom),
        Some(&SourceOutcome::Fetched { records: 2 })
    );
}
