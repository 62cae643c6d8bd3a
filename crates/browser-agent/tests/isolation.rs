//! End-to-end scenarios over the skill catalog with the mock driver:
//! task isolation and sweeper reclamation.

use std::sync::Arc;
use std::time::Duration;

use browser_agent::artifacts::ArtifactStore;
use browser_agent::testing::MockDriver;
use browser_agent::{builtin_skills, AgentError, RequestContext, SessionManager, Skill as _};
use browser_driver::{BrowserConfig, Driver};
use serde_json::{json, Map, Value};

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn setup(
    timeout: Duration,
    sweep: Duration,
) -> (
    Arc<MockDriver>,
    Arc<SessionManager>,
    browser_agent::SkillSet,
    tempfile::TempDir,
) {
    let driver = Arc::new(MockDriver::new());
    let sessions = SessionManager::new(
        Arc::clone(&driver) as Arc<dyn Driver>,
        BrowserConfig::default(),
        timeout,
        sweep,
    );
    let dir = tempfile::tempdir().unwrap();
    let artifacts = Arc::new(ArtifactStore::new(dir.path()).unwrap());
    let skills = builtin_skills(
        Arc::clone(&sessions),
        artifacts,
        "http://localhost:8081".into(),
    );
    (driver, sessions, skills, dir)
}

#[tokio::test]
async fn cookies_set_under_one_task_are_invisible_to_another() {
    let (driver, _sessions, skills, _dir) = setup(Duration::from_secs(60), Duration::from_secs(60));

    let navigate = skills.get("navigate_to_url").unwrap();
    let script = skills.get("execute_script").unwrap();

    // Task A visits a page that sets a cookie.
    let response = navigate
        .call(
            &RequestContext::for_task("A"),
            &args(json!({"url": "https://example.test/set-cookie"})),
        )
        .await
        .unwrap();
    assert!(response.contains("\"success\":true"));
    assert_eq!(driver.pages()[0].cookie(), "session_token=abc123");

    // Task B reads cookies in its own session and sees none of A's state.
    let response = script
        .call(
            &RequestContext::for_task("B"),
            &args(json!({"script": "return document.cookie"})),
        )
        .await
        .unwrap();
    let parsed: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(parsed["success"], true);
    assert_eq!(parsed["result"], "");
    assert_eq!(parsed["session_id"], "B");

    // Task A, by contrast, still sees its cookie.
    let response = script
        .call(
            &RequestContext::for_task("A"),
            &args(json!({"script": "return document.cookie"})),
        )
        .await
        .unwrap();
    let parsed: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(parsed["result"], "session_token=abc123");

    // Two tasks, two launches, distinct pages.
    assert_eq!(driver.launch_count(), 2);
}

#[tokio::test]
async fn sweeper_evicts_idle_task_session() {
    let (driver, sessions, skills, _dir) =
        setup(Duration::from_millis(100), Duration::from_millis(50));
    sessions.spawn_sweeper().await;

    let navigate = skills.get("navigate_to_url").unwrap();
    navigate
        .call(
            &RequestContext::for_task("C"),
            &args(json!({"url": "https://example.test/"})),
        )
        .await
        .unwrap();
    assert_eq!(sessions.active_sessions().await, 1);

    tokio::time::sleep(Duration::from_millis(300)).await;

    match sessions.get("C").await {
        Err(AgentError::SessionExpired(_)) | Err(AgentError::SessionNotFound(_)) => {}
        other => panic!("expected expired or not-found, got {other:?}"),
    }
    assert_eq!(sessions.active_sessions().await, 0);
    assert_eq!(driver.close_count(), 1);

    sessions.shutdown().await;
}

#[tokio::test]
async fn skill_calls_reuse_the_task_session_across_skills() {
    let (driver, _sessions, skills, _dir) = setup(Duration::from_secs(60), Duration::from_secs(60));

    let ctx = RequestContext::for_task("T");
    skills
        .get("navigate_to_url")
        .unwrap()
        .call(&ctx, &args(json!({"url": "https://example.test/"})))
        .await
        .unwrap();
    skills
        .get("click_element")
        .unwrap()
        .call(&ctx, &args(json!({"selector": "#next"})))
        .await
        .unwrap();
    skills
        .get("scroll")
        .unwrap()
        .call(&ctx, &args(json!({"target": "page", "direction": "down"})))
        .await
        .unwrap();

    // One session, one page, all actions serialized onto it.
    assert_eq!(driver.launch_count(), 1);
    let actions = driver.pages()[0].actions();
    assert!(actions.len() >= 3);
}

#[tokio::test]
async fn requests_without_task_identity_get_private_sessions() {
    let (driver, _sessions, skills, _dir) = setup(Duration::from_secs(60), Duration::from_secs(60));

    let navigate = skills.get("navigate_to_url").unwrap();
    let first = navigate
        .call(
            &RequestContext::default(),
            &args(json!({"url": "https://example.test/"})),
        )
        .await
        .unwrap();
    let second = navigate
        .call(
            &RequestContext::default(),
            &args(json!({"url": "https://example.test/"})),
        )
        .await
        .unwrap();

    let first: Value = serde_json::from_str(&first).unwrap();
    let second: Value = serde_json::from_str(&second).unwrap();
    let id_a = first["session_id"].as_str().unwrap();
    let id_b = second["session_id"].as_str().unwrap();

    assert!(id_a.starts_with("task_"));
    assert!(id_b.starts_with("task_"));
    assert_ne!(id_a, id_b);
    assert_eq!(driver.launch_count(), 2);
}
