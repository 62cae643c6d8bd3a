//! wait_for_condition: block until a page condition holds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use browser_driver::{WaitCondition as DriverWait, WaitState};
use serde_json::{json, Map, Value};
use tracing::info;

use super::args;
use super::click::normalize_selector;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::error::{AgentError, Result};
use crate::session::SessionManager;

const CONDITIONS: &[&str] = &["selector", "navigation", "function", "timeout", "networkidle"];
const STATES: &[&str] = &["visible", "hidden", "attached", "detached"];

/// Page-injected polling function: instruments fetch and XMLHttpRequest,
/// counts in-flight requests, and resolves once the counter has stayed at
/// zero for 500 ms.
const NETWORK_IDLE_FUNCTION: &str = r#"() => {
    return new Promise((resolve) => {
        let timer;
        let requestCount = 0;

        const originalFetch = window.fetch;
        window.fetch = function(...fetchArgs) {
            requestCount++;
            return originalFetch.apply(this, fetchArgs).finally(() => {
                requestCount--;
                if (requestCount === 0) {
                    clearTimeout(timer);
                    timer = setTimeout(() => resolve(true), 500);
                }
            });
        };

        const OriginalXHR = window.XMLHttpRequest;
        window.XMLHttpRequest = function() {
            const xhr = new OriginalXHR();
            const originalSend = xhr.send;
            xhr.send = function(...sendArgs) {
                requestCount++;
                xhr.addEventListener('loadend', () => {
                    requestCount--;
                    if (requestCount === 0) {
                        clearTimeout(timer);
                        timer = setTimeout(() => resolve(true), 500);
                    }
                });
                return originalSend.apply(this, sendArgs);
            };
            return xhr;
        };

        if (requestCount === 0) {
            timer = setTimeout(() => resolve(true), 500);
        }
    });
}"#;

pub struct WaitForCondition {
    sessions: Arc<SessionManager>,
    descriptor: SkillDescriptor,
}

impl WaitForCondition {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let descriptor = SkillDescriptor {
            name: "wait_for_condition",
            description: "Wait for specific conditions before proceeding with automation",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new("condition", ParamKind::String, "Type of condition")
                        .with_enum(CONDITIONS),
                    ParamField::new(
                        "selector",
                        ParamKind::String,
                        "Selector to wait for if condition is 'selector'",
                    ),
                    ParamField::new("state", ParamKind::String, "State to wait for")
                        .with_default(json!("visible"))
                        .with_enum(STATES),
                    ParamField::new(
                        "timeout",
                        ParamKind::Integer,
                        "Maximum time to wait in milliseconds",
                    )
                    .with_default(json!(30000)),
                    ParamField::new(
                        "custom_function",
                        ParamKind::String,
                        "Custom JavaScript function to evaluate for 'function' condition",
                    ),
                ],
                vec!["condition"],
            ),
        };
        Self {
            sessions,
            descriptor,
        }
    }
}

#[async_trait]
impl Skill for WaitForCondition {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let condition = args::req_enum(args, "condition", CONDITIONS)?;
        let selector = args::opt_str(args, "selector")?.unwrap_or_default().to_string();
        let state = args::str_enum(args, "state", STATES, "visible")?;
        let timeout_ms = args::positive_u64(args, "timeout", 30_000)?;
        let custom_function = args::opt_str(args, "custom_function")?
            .unwrap_or_default()
            .to_string();

        match condition {
            "selector" if selector.is_empty() => {
                return Err(AgentError::invalid(
                    "selector",
                    "is required for selector condition",
                ));
            }
            "function" if custom_function.is_empty() => {
                return Err(AgentError::invalid(
                    "custom_function",
                    "is required for function condition",
                ));
            }
            _ => {}
        }

        info!(
            target = "agent.skills",
            condition,
            selector = %selector,
            state,
            timeout_ms,
            "waiting for condition"
        );

        let session = self.sessions.task_session(ctx).await?;
        let timeout = Duration::from_millis(timeout_ms);
        let started = Instant::now();

        let wait = match condition {
            "selector" => DriverWait::Selector {
                selector: normalize_selector(&selector),
                state: match state {
                    "hidden" => WaitState::Hidden,
                    "attached" => WaitState::Attached,
                    "detached" => WaitState::Detached,
                    _ => WaitState::Visible,
                },
            },
            "function" => DriverWait::Function {
                body: custom_function.clone(),
            },
            "networkidle" => DriverWait::Function {
                body: NETWORK_IDLE_FUNCTION.to_string(),
            },
            // navigation and timeout both degrade to a plain sleep
            _ => DriverWait::Sleep,
        };

        session
            .page
            .wait_for(&wait, timeout)
            .await
            .map_err(|e| AgentError::driver("wait_for_condition", e))?;

        let actual_wait_ms = started.elapsed().as_millis() as u64;
        info!(
            target = "agent.skills",
            condition,
            session_id = %session.id,
            actual_wait_ms,
            "wait condition completed"
        );

        let response = json!({
            "success": true,
            "condition": condition,
            "selector": selector,
            "state": state,
            "timeout_ms": timeout_ms,
            "actual_wait_ms": actual_wait_ms,
            "session_id": session.id,
            "custom_function": custom_function,
            "message": "Wait condition completed successfully",
        });
        Ok(response.to_string())
    }
}
