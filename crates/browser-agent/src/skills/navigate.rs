//! navigate_to_url: load a page and wait for it to settle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;
use url::Url;

use super::args;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::error::{AgentError, Result};
use crate::session::SessionManager;

const WAIT_CONDITIONS: &[&str] = &["domcontentloaded", "load", "networkidle"];

pub struct NavigateToUrl {
    sessions: Arc<SessionManager>,
    descriptor: SkillDescriptor,
}

impl NavigateToUrl {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let descriptor = SkillDescriptor {
            name: "navigate_to_url",
            description: "Navigate to a specific URL and wait for the page to fully load",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new("url", ParamKind::String, "The URL to navigate to"),
                    ParamField::new(
                        "wait_until",
                        ParamKind::String,
                        "When to consider navigation succeeded",
                    )
                    .with_default(json!("load"))
                    .with_enum(WAIT_CONDITIONS),
                    ParamField::new(
                        "timeout",
                        ParamKind::Integer,
                        "Maximum navigation timeout in milliseconds",
                    )
                    .with_default(json!(30000)),
                ],
                vec!["url"],
            ),
        };
        Self {
            sessions,
            descriptor,
        }
    }
}

/// Normalises and validates a navigation URL: scheme-less input gets
/// `https://`, only http/https pass, and the host must be non-empty.
pub fn normalize_url(raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(AgentError::invalid("url", "cannot be empty"));
    }

    let candidate = match Url::parse(raw) {
        Ok(parsed) => parsed,
        // Scheme-less input gets the https default; anything else that
        // fails to parse is simply malformed.
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}"))
            .map_err(|_| AgentError::invalid("url", "is not a well-formed URL"))?,
        Err(_) => return Err(AgentError::invalid("url", "is not a well-formed URL")),
    };

    match candidate.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AgentError::invalid(
                "url",
                format!("unsupported scheme `{other}`; only http and https are supported"),
            ))
        }
    }

    if candidate.host_str().map_or(true, str::is_empty) {
        return Err(AgentError::invalid("url", "must include a valid host"));
    }

    Ok(candidate.to_string())
}

#[async_trait]
impl Skill for NavigateToUrl {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let url = normalize_url(args::req_str(args, "url")?)?;
        let wait_until = args::str_enum(args, "wait_until", WAIT_CONDITIONS, "load")?;
        let timeout_ms = args::positive_u64(args, "timeout", 30_000)?;

        info!(
            target = "agent.skills",
            %url,
            wait_until,
            timeout_ms,
            "navigating to URL"
        );

        let session = self.sessions.task_session(ctx).await?;
        let wait = match wait_until {
            "domcontentloaded" => browser_driver::WaitUntil::Domcontentloaded,
            "networkidle" => browser_driver::WaitUntil::Networkidle,
            _ => browser_driver::WaitUntil::Load,
        };

        session
            .page
            .navigate(&url, wait, Duration::from_millis(timeout_ms))
            .await
            .map_err(|e| AgentError::driver("navigate_to_url", e))?;

        info!(target = "agent.skills", %url, session_id = %session.id, "navigation completed");

        let response = json!({
            "success": true,
            "url": url,
            "wait_until": wait_until,
            "timeout_ms": timeout_ms,
            "session_id": session.id,
            "message": "Navigation completed successfully",
        });
        Ok(response.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_session_manager, MockAction};

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn url_normalisation() {
        assert_eq!(normalize_url("example.com").unwrap(), "https://example.com/");
        assert_eq!(
            normalize_url("https://example.com/page").unwrap(),
            "https://example.com/page"
        );
        assert!(normalize_url("ftp://x").is_err());
        assert!(normalize_url("https://").is_err());
        assert!(normalize_url("ht tp://x").is_err());
        assert!(normalize_url("").is_err());
    }

    #[tokio::test]
    async fn navigates_in_task_session() {
        let (driver, sessions) = mock_session_manager();
        let skill = NavigateToUrl::new(sessions);

        let ctx = RequestContext::for_task("task-1");
        let response = skill
            .call(&ctx, &args(json!({"url": "example.com"})))
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["session_id"], "task-1");
        assert_eq!(parsed["url"], "https://example.com/");
        assert_eq!(parsed["wait_until"], "load");

        let page = driver.last_page().unwrap();
        assert_eq!(
            page.actions()[0],
            MockAction::Navigate {
                url: "https://example.com/".into()
            }
        );
    }

    #[tokio::test]
    async fn rejects_bad_wait_until() {
        let (_, sessions) = mock_session_manager();
        let skill = NavigateToUrl::new(sessions);

        let err = skill
            .call(
                &RequestContext::default(),
                &args(json!({"url": "example.com", "wait_until": "idle"})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("wait_until"));
    }

    #[tokio::test]
    async fn driver_failure_is_wrapped() {
        let (driver, sessions) = mock_session_manager();
        let skill = NavigateToUrl::new(Arc::clone(&sessions));

        // Pre-create the session so the failure can be scripted on its page.
        let ctx = RequestContext::for_task("task-f");
        sessions.task_session(&ctx).await.unwrap();
        driver.last_page().unwrap().fail_navigation("net::ERR_FAILED");

        let err = skill
            .call(&ctx, &args(json!({"url": "https://example.com"})))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("navigate_to_url"));
    }
}
