//! Artifact HTTP surface: download, metadata, health, and the
//! screenshot-to-download round trip.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use browser_agent::artifacts::{artifact_router, ArtifactStore};
use browser_agent::testing::MockDriver;
use browser_agent::{builtin_skills, RequestContext, SessionManager, Skill as _};
use browser_driver::{BrowserConfig, Driver};
use serde_json::{json, Map, Value};

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

async fn spawn_server(store: Arc<ArtifactStore>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, artifact_router(store)).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn downloads_registered_artifact_with_headers() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::new(dir.path()).unwrap());
    let entry = store
        .register_bytes(
            "report.txt",
            b"report body",
            "text/plain",
            Some("Report".into()),
            None,
            serde_json::Map::new(),
        )
        .await
        .unwrap();

    let addr = spawn_server(Arc::clone(&store)).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/artifacts/{}", entry.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/plain"
    );
    assert_eq!(
        response.headers()["content-disposition"].to_str().unwrap(),
        "attachment; filename=\"report.txt\""
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"report body");
}

#[tokio::test]
async fn metadata_and_unknown_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::new(dir.path()).unwrap());
    let entry = store
        .register_bytes(
            "data.json",
            b"{}",
            "application/json",
            None,
            None,
            serde_json::Map::new(),
        )
        .await
        .unwrap();

    let addr = spawn_server(Arc::clone(&store)).await;
    let client = reqwest::Client::new();

    let metadata: Value = client
        .get(format!("http://{addr}/artifacts/{}/metadata", entry.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metadata["id"], entry.id.as_str());
    assert_eq!(metadata["mime_type"], "application/json");
    assert_eq!(metadata["size"], 2);

    let response = client
        .get(format!("http://{addr}/artifacts/artifact_missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let health: Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn missing_backing_file_is_not_found_but_entry_remains() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::new(dir.path()).unwrap());
    let entry = store
        .register_bytes(
            "gone.txt",
            b"bytes",
            "text/plain",
            None,
            None,
            serde_json::Map::new(),
        )
        .await
        .unwrap();

    std::fs::remove_file(&entry.file_path).unwrap();

    let addr = spawn_server(Arc::clone(&store)).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/artifacts/{}", entry.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // The registry entry itself is not auto-removed.
    let response = client
        .get(format!("http://{addr}/artifacts/{}/metadata", entry.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn screenshot_skill_round_trips_through_download() {
    let driver = Arc::new(MockDriver::new());
    let sessions = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn Driver>,
        BrowserConfig::default(),
        Duration::from_secs(60),
        Duration::from_secs(60),
    );
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::new(dir.path()).unwrap());
    let skills = builtin_skills(
        Arc::clone(&sessions),
        Arc::clone(&store),
        "http://localhost:8081".into(),
    );

    let navigate = skills.get("navigate_to_url").unwrap();
    navigate
        .call(
            &RequestContext::for_task("D"),
            &args(json!({"url": "https://example.test/"})),
        )
        .await
        .unwrap();

    let screenshot = skills.get("take_screenshot").unwrap();
    let response = screenshot
        .call(&RequestContext::for_task("D"), &args(json!({})))
        .await
        .unwrap();
    let parsed: Value = serde_json::from_str(&response).unwrap();

    let filename = parsed["filename"].as_str().unwrap();
    assert!(filename.starts_with("viewport_"));
    assert!(filename.ends_with(".png"));
    let artifact_id = parsed["artifact_id"].as_str().unwrap();

    let addr = spawn_server(Arc::clone(&store)).await;
    let response = reqwest::Client::new()
        .get(format!("http://{addr}/artifacts/{artifact_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "image/png"
    );
    let bytes = response.bytes().await.unwrap();
    assert_eq!(&bytes[..4], &[0x89, 0x50, 0x4E, 0x47]);
}
