//! JSON-RPC surface over a live listener: skill dispatch, the agent card,
//! and the health probe.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use browser_agent::artifacts::ArtifactStore;
use browser_agent::rpc::{rpc_router, RpcState};
use browser_agent::testing::MockDriver;
use browser_agent::{builtin_skills, SessionManager};
use browser_driver::{BrowserConfig, Driver};
use serde_json::{json, Value};

async fn spawn_agent() -> (SocketAddr, Arc<SessionManager>, tempfile::TempDir) {
    let driver = Arc::new(MockDriver::new());
    let sessions = SessionManager::new(
        driver as Arc<dyn Driver>,
        BrowserConfig::default(),
        Duration::from_secs(60),
        Duration::from_secs(60),
    );
    let dir = tempfile::tempdir().unwrap();
    let artifacts = Arc::new(ArtifactStore::new(dir.path()).unwrap());
    let skills = builtin_skills(
        Arc::clone(&sessions),
        artifacts,
        "http://localhost:8081".into(),
    );

    let state = RpcState {
        skills,
        sessions: Arc::clone(&sessions),
        agent_version: "test",
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, rpc_router(state)).await.unwrap();
    });
    (addr, sessions, dir)
}

#[tokio::test]
async fn navigate_over_rpc_creates_task_session() {
    let (addr, sessions, _dir) = spawn_agent().await;
    let client = reqwest::Client::new();

    let response: Value = client
        .post(format!("http://{addr}/rpc"))
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "navigate_to_url",
            "params": { "task_id": "rpc-task", "arguments": { "url": "example.com" } }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["success"], true);
    assert_eq!(response["result"]["session_id"], "rpc-task");
    assert_eq!(response["result"]["url"], "https://example.com/");
    assert_eq!(sessions.active_sessions().await, 1);
}

#[tokio::test]
async fn error_envelope_carries_correlation_fields() {
    let (addr, _sessions, _dir) = spawn_agent().await;
    let client = reqwest::Client::new();

    let response: Value = client
        .post(format!("http://{addr}/rpc"))
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 9,
            "method": "execute_script",
            "params": { "task_id": "rpc-task", "arguments": { "script": "eval('x')" } }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response["id"], 9);
    assert_eq!(response["error"]["code"], -32602);
    assert_eq!(response["error"]["data"]["success"], false);
    assert_eq!(response["error"]["data"]["skill"], "execute_script");
    assert_eq!(response["error"]["data"]["task_id"], "rpc-task");
    assert!(response["error"]["data"]["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn card_and_health() {
    let (addr, _sessions, _dir) = spawn_agent().await;
    let client = reqwest::Client::new();

    let card: Value = client
        .get(format!("http://{addr}/card"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(card["name"], "browser-agent");
    let skills = card["skills"].as_array().unwrap();
    assert_eq!(skills.len(), 10);
    let navigate = skills
        .iter()
        .find(|skill| skill["name"] == "navigate_to_url")
        .unwrap();
    assert_eq!(
        navigate["parameters"]["properties"]["wait_until"]["default"],
        "load"
    );

    let health: Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["active_sessions"], 0);
}
