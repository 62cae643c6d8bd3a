//! execute_script: run caller-supplied JavaScript in the page, behind a
//! deny-list.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use super::args;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::error::{AgentError, Result};
use crate::session::SessionManager;

const MAX_SCRIPT_LEN: usize = 50_000;

/// Patterns rejected after lowercasing and stripping whitespace, which is
/// what makes the check insensitive to spacing tricks like `eval (`.
const DENIED_PATTERNS: &[&str] = &[
    // File system access
    "require('fs'",
    "require(\"fs\"",
    "require('path'",
    "require(\"path\"",
    "require('os'",
    "require(\"os\"",
    // Network access
    "require('http'",
    "require(\"http\"",
    "require('https'",
    "require(\"https\"",
    "require('net'",
    "require(\"net\"",
    // Process execution
    "require('child_process'",
    "require(\"child_process\"",
    "exec(",
    "spawn(",
    // Eval and dynamic code execution
    "eval(",
    "function(",
    "settimeout(",
    "setinterval(",
    // Global object access
    "global.",
    "process.",
    "__dirname",
    "__filename",
    // Browser APIs that destroy or hijack state
    "localstorage.clear",
    "sessionstorage.clear",
    "document.cookie=",
    "window.location=",
];

#[derive(Debug, Serialize)]
struct ScriptExecutionResult {
    success: bool,
    result: Value,
    result_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    execution_ms: u64,
    session_id: String,
    timestamp: String,
    script_hash: String,
    message: String,
    metadata: Value,
}

pub struct ExecuteScript {
    sessions: Arc<SessionManager>,
    descriptor: SkillDescriptor,
}

impl ExecuteScript {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let descriptor = SkillDescriptor {
            name: "execute_script",
            description: "Execute custom JavaScript code in the browser context",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new("script", ParamKind::String, "JavaScript code to execute"),
                    ParamField::new(
                        "args",
                        ParamKind::Array,
                        "Arguments to pass to the script (available as arguments[0], arguments[1], ...)",
                    )
                    .with_default(json!([])),
                    ParamField::new(
                        "return_value",
                        ParamKind::Boolean,
                        "Whether to return the script execution result",
                    )
                    .with_default(json!(true)),
                    ParamField::new(
                        "timeout",
                        ParamKind::Integer,
                        "Maximum script execution timeout in milliseconds",
                    )
                    .with_default(json!(30000)),
                    ParamField::new(
                        "async",
                        ParamKind::Boolean,
                        "Whether the script contains async operations (will wrap in async function)",
                    )
                    .with_default(json!(false)),
                ],
                vec!["script"],
            ),
        };
        Self {
            sessions,
            descriptor,
        }
    }
}

/// Rejects scripts that reach for the deny-listed capabilities or exceed
/// the size cap.
pub fn validate_script(script: &str) -> Result<()> {
    let compact: String = script
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    for pattern in DENIED_PATTERNS {
        if compact.contains(pattern) {
            return Err(AgentError::SecurityRejected(format!(
                "script contains potentially dangerous pattern: {pattern}"
            )));
        }
    }

    if script.len() > MAX_SCRIPT_LEN {
        return Err(AgentError::SecurityRejected(format!(
            "script too large: {} characters (max {MAX_SCRIPT_LEN})",
            script.len()
        )));
    }

    Ok(())
}

/// Wraps async scripts in an awaited IIFE so rejections propagate.
fn prepare_script(script: &str, is_async: bool) -> String {
    if !is_async {
        return script.to_string();
    }
    format!(
        "return (async function() {{\n    try {{\n        {script}\n    }} catch (error) {{\n        throw error;\n    }}\n}})()"
    )
}

/// Deterministic script tag used for logging and correlation.
fn script_hash(script: &str) -> String {
    let len = script.len();
    if len <= 32 {
        return format!("script_{len}_chars");
    }
    let prefix: String = script.as_bytes()[..32]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!("script_{len}_chars_{prefix}")
}

fn result_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl Skill for ExecuteScript {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let started = Instant::now();

        let script = args::req_str(args, "script")?;
        validate_script(script)?;

        let script_args = args::opt_array(args, "args")?.cloned().unwrap_or_default();
        let return_value = args::opt_bool(args, "return_value", true)?;
        let timeout_ms = args::positive_u64(args, "timeout", 30_000)?;
        let is_async = args::opt_bool(args, "async", false)?;

        let processed = prepare_script(script, is_async);
        let hash = script_hash(script);

        info!(
            target = "agent.skills",
            script_hash = %hash,
            args_count = script_args.len(),
            return_value,
            timeout_ms,
            is_async,
            "executing script"
        );

        let session = self.sessions.task_session(ctx).await?;
        let outcome = session
            .page
            .evaluate(&processed, &script_args, Duration::from_millis(timeout_ms))
            .await;

        let execution_ms = started.elapsed().as_millis() as u64;
        let metadata = json!({
            "args_count": script_args.len(),
            "return_value": return_value,
            "timeout_ms": timeout_ms,
            "async": is_async,
            "script_length": script.len(),
            "processed": processed != script,
        });

        let result = match outcome {
            Ok(value) => {
                let value = if return_value { value } else { Value::Null };
                info!(
                    target = "agent.skills",
                    session_id = %session.id,
                    script_hash = %hash,
                    result_type = result_type(&value),
                    execution_ms,
                    "script execution completed"
                );
                ScriptExecutionResult {
                    success: true,
                    result_type: result_type(&value).to_string(),
                    result: value,
                    error: None,
                    execution_ms,
                    session_id: session.id.clone(),
                    timestamp: crate::artifacts::rfc3339_now(),
                    script_hash: hash,
                    message: "Script executed successfully".to_string(),
                    metadata,
                }
            }
            Err(err) => {
                error!(
                    target = "agent.skills",
                    session_id = %session.id,
                    script_hash = %hash,
                    error = %err,
                    "script execution failed"
                );
                ScriptExecutionResult {
                    success: false,
                    result: Value::Null,
                    result_type: "null".to_string(),
                    error: Some(err.to_string()),
                    execution_ms,
                    session_id: session.id.clone(),
                    timestamp: crate::artifacts::rfc3339_now(),
                    script_hash: hash,
                    message: "Script execution failed".to_string(),
                    metadata,
                }
            }
        };

        Ok(serde_json::to_string(&result)?)
    }
}
