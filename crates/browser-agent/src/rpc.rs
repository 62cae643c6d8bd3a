//! JSON-RPC framing over the skill catalog, plus the agent card and
//! health probe. Deliberately thin: the transport parses the envelope,
//! extracts the task identity, and hands the argument map to the skill.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::session::SessionManager;
use crate::skills::{RequestContext, Skill, SkillSet};

#[derive(Clone)]
pub struct RpcState {
    pub skills: SkillSet,
    pub sessions: Arc<SessionManager>,
    pub agent_version: &'static str,
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: RpcParams,
}

#[derive(Debug, Default, Deserialize)]
struct RpcParams {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    arguments: Map<String, Value>,
}

pub fn rpc_router(state: RpcState) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/card", get(agent_card))
        .route("/health", get(health))
        .with_state(state)
}

/// Binds the agent server and serves until `shutdown` resolves.
pub async fn serve(
    state: RpcState,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(target = "agent.rpc", %addr, "agent server listening");

    axum::serve(listener, rpc_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

fn rpc_error(id: Value, code: i64, message: String, data: Option<Value>) -> Json<Value> {
    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = data;
    }
    Json(json!({ "jsonrpc": "2.0", "id": id, "error": error }))
}

fn error_code(err: &AgentError) -> i64 {
    match err {
        AgentError::InvalidParameter { .. } | AgentError::SecurityRejected(_) => -32602,
        AgentError::Shutdown => -32001,
        _ => -32000,
    }
}

async fn handle_rpc(State(state): State<RpcState>, body: String) -> Response {
    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            return rpc_error(
                Value::Null,
                -32700,
                format!("parse error: {err}"),
                None,
            )
            .into_response()
        }
    };

    if let Some(version) = &request.jsonrpc {
        if version != "2.0" {
            return rpc_error(request.id, -32600, "unsupported jsonrpc version".into(), None)
                .into_response();
        }
    }

    let Some(skill) = state.skills.get(&request.method) else {
        return rpc_error(
            request.id,
            -32601,
            format!("method not found: {}", request.method),
            None,
        )
        .into_response();
    };

    let ctx = RequestContext {
        task_id: request.params.task_id.clone(),
    };

    match skill.call(&ctx, &request.params.arguments).await {
        Ok(result) => {
            // Skill responses are JSON text; embed them as structured data.
            let parsed: Value =
                serde_json::from_str(&result).unwrap_or(Value::String(result));
            Json(json!({ "jsonrpc": "2.0", "id": request.id, "result": parsed })).into_response()
        }
        Err(err) => {
            warn!(
                target = "agent.rpc",
                method = %request.method,
                task_id = request.params.task_id.as_deref().unwrap_or(""),
                error = %err,
                "skill call failed"
            );
            let data = json!({
                "success": false,
                "skill": request.method,
                "task_id": request.params.task_id,
                "error": err.to_string(),
                "timestamp": crate::artifacts::rfc3339_now(),
            });
            rpc_error(request.id, error_code(&err), err.to_string(), Some(data)).into_response()
        }
    }
}

async fn agent_card(State(state): State<RpcState>) -> Json<Value> {
    let skills: Vec<Value> = state
        .skills
        .descriptors()
        .iter()
        .map(|descriptor| descriptor.card_entry())
        .collect();

    Json(json!({
        "name": "browser-agent",
        "description": "Browser automation agent with task-isolated sessions",
        "version": state.agent_version,
        "skills": skills,
    }))
}

async fn health(State(state): State<RpcState>) -> Response {
    let active = state.sessions.active_sessions().await;
    (
        StatusCode::OK,
        Json(json!({ "status": "healthy", "active_sessions": active })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactStore;
    use crate::skills::builtin_skills;
    use crate::testing::mock_session_manager;

    fn state() -> (RpcState, tempfile::TempDir) {
        let (_, sessions) = mock_session_manager();
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()).unwrap());
        let skills = builtin_skills(
            Arc::clone(&sessions),
            artifacts,
            "http://localhost:8081".into(),
        );
        (
            RpcState {
                skills,
                sessions,
                agent_version: "test",
            },
            dir,
        )
    }

    #[tokio::test]
    async fn card_lists_all_skills() {
        let (state, _dir) = state();
        let Json(card) = agent_card(State(state)).await;
        assert_eq!(card["name"], "browser-agent");
        assert_eq!(card["skills"].as_array().unwrap().len(), 10);
        assert!(card["skills"][0]["parameters"]["properties"].is_object());
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let (state, _dir) = state();
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "no_such_skill",
            "params": {}
        })
        .to_string();

        let response = handle_rpc(State(state), body).await;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn invalid_parameter_maps_to_invalid_params() {
        let (state, _dir) = state();
        let body = json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "click_element",
            "params": { "task_id": "t1", "arguments": { "selector": "#x", "button": "diagonal" } }
        })
        .to_string();

        let response = handle_rpc(State(state), body).await;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["id"], 7);
        assert_eq!(parsed["error"]["code"], -32602);
        assert_eq!(parsed["error"]["data"]["skill"], "click_element");
        assert_eq!(parsed["error"]["data"]["task_id"], "t1");
    }

    #[tokio::test]
    async fn successful_call_embeds_skill_response() {
        let (state, _dir) = state();
        let body = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "navigate_to_url",
            "params": { "task_id": "t2", "arguments": { "url": "example.com" } }
        })
        .to_string();

        let response = handle_rpc(State(state), body).await;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["result"]["success"], true);
        assert_eq!(parsed["result"]["session_id"], "t2");
    }
}
