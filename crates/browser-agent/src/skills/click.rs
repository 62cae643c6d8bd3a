//! click_element: click an element located by CSS, XPath, text, or role.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use browser_driver::{ClickOptions, MouseButton, Selector, SelectorKind, WaitCondition, WaitState};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::args;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::error::{AgentError, Result};
use crate::session::{SessionManager, SessionRef};

const BUTTONS: &[&str] = &["left", "right", "middle"];

pub struct ClickElement {
    sessions: Arc<SessionManager>,
    descriptor: SkillDescriptor,
}

impl ClickElement {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let descriptor = SkillDescriptor {
            name: "click_element",
            description:
                "Click on an element identified by selector, text, or other locator strategies",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new(
                        "selector",
                        ParamKind::String,
                        "CSS selector, XPath, or text to identify the element",
                    ),
                    ParamField::new("button", ParamKind::String, "Mouse button to use")
                        .with_default(json!("left"))
                        .with_enum(BUTTONS),
                    ParamField::new("click_count", ParamKind::Integer, "Number of times to click")
                        .with_default(json!(1)),
                    ParamField::new(
                        "force",
                        ParamKind::Boolean,
                        "Force click even if element is not visible",
                    )
                    .with_default(json!(false)),
                    ParamField::new(
                        "timeout",
                        ParamKind::Integer,
                        "Maximum time to wait for element in milliseconds",
                    )
                    .with_default(json!(30000)),
                ],
                vec!["selector"],
            ),
        };
        Self {
            sessions,
            descriptor,
        }
    }

    /// Waits for the selector to become visible before clicking. When it
    /// does not, reports whether iframes are present: elements inside
    /// iframes cannot be reached, and the error should say so.
    async fn wait_actionable(
        &self,
        session: &SessionRef,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<()> {
        let wait = WaitCondition::Selector {
            selector: selector.clone(),
            state: WaitState::Visible,
        };
        if session.page.wait_for(&wait, timeout).await.is_ok() {
            return Ok(());
        }

        warn!(
            target = "agent.skills",
            selector = %selector.raw,
            session_id = %session.id,
            "element not visible"
        );

        let iframes = session
            .page
            .count_elements("iframe")
            .await
            .unwrap_or_default();
        let reason = if iframes > 0 {
            format!(
                "element not found in main frame, {iframes} iframes detected but \
                 cross-frame clicking is not implemented: {}",
                selector.raw
            )
        } else {
            format!("element not found: {}", selector.raw)
        };
        Err(AgentError::ElementNotActionable { reason })
    }
}

/// Rewrites a raw selector into a (selector, strategy) pair: `xpath=`
/// prefixes and leading slashes go to xpath, quoted literals become
/// `text=` lookups, role/testid markers are recognised, and anything else
/// is treated as CSS.
pub fn normalize_selector(raw: &str) -> Selector {
    let trimmed = raw.trim();

    if let Some(stripped) = trimmed.strip_prefix("xpath=") {
        return Selector {
            raw: stripped.to_string(),
            kind: SelectorKind::Xpath,
        };
    }
    if trimmed.starts_with('/') {
        return Selector {
            raw: trimmed.to_string(),
            kind: SelectorKind::Xpath,
        };
    }

    let quoted = (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
        || (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2);
    if quoted {
        let inner = &trimmed[1..trimmed.len() - 1];
        return Selector {
            raw: format!("text={inner}"),
            kind: SelectorKind::Text,
        };
    }

    if trimmed.contains("text=")
        || trimmed.contains(":text(")
        || trimmed.contains(":has-text(")
        || trimmed.contains(":text-is(")
        || trimmed.contains(":text-matches(")
    {
        return Selector {
            raw: trimmed.to_string(),
            kind: SelectorKind::Text,
        };
    }

    if trimmed.starts_with("role=") || trimmed.contains("[role=") {
        return Selector {
            raw: trimmed.to_string(),
            kind: SelectorKind::Role,
        };
    }

    if trimmed.contains("data-testid") || trimmed.contains("test-id") {
        return Selector {
            raw: trimmed.to_string(),
            kind: SelectorKind::Testid,
        };
    }

    Selector {
        raw: trimmed.to_string(),
        kind: SelectorKind::Css,
    }
}

#[async_trait]
impl Skill for ClickElement {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let raw_selector = args::req_str(args, "selector")?;
        let button = args::str_enum(args, "button", BUTTONS, "left")?;
        let click_count = args::positive_u64(args, "click_count", 1)?;
        let force = args::opt_bool(args, "force", false)?;
        let timeout_ms = args::positive_u64(args, "timeout", 30_000)?;

        let selector = normalize_selector(raw_selector);
        debug!(
            target = "agent.skills",
            original = raw_selector,
            normalized = %selector.raw,
            kind = %selector.kind,
            "normalized selector"
        );

        info!(
            target = "agent.skills",
            selector = %selector.raw,
            button,
            click_count,
            force,
            timeout_ms,
            "clicking element"
        );

        let session = self.sessions.task_session(ctx).await?;
        let timeout = Duration::from_millis(timeout_ms);

        if !force {
            self.wait_actionable(&session, &selector, timeout).await?;
        }

        let options = ClickOptions {
            button: match button {
                "right" => MouseButton::Right,
                "middle" => MouseButton::Middle,
                _ => MouseButton::Left,
            },
            click_count: click_count as u32,
            force,
            timeout,
        };

        session
            .page
            .click(&selector, &options)
            .await
            .map_err(|e| AgentError::driver("click_element", e))?;

        info!(
            target = "agent.skills",
            selector = %selector.raw,
            session_id = %session.id,
            "element clicked"
        );

        let response = json!({
            "success": true,
            "selector": raw_selector,
            "selector_type": selector.kind.to_string(),
            "button": button,
            "click_count": click_count,
            "force": force,
            "timeout_ms": timeout_ms,
            "session_id": session.id,
            "message": "Element clicked successfully",
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
    fn selector_normalisation() {
        let s = normalize_selector("xpath=//button");
        assert_eq!(s.raw, "//button");
        assert_eq!(s.kind, SelectorKind::Xpath);

        let s = normalize_selector("//div[@id='x']");
        assert_eq!(s.kind, SelectorKind::Xpath);

        let s = normalize_selector("'Click Me'");
        assert_eq!(s.raw, "text=Click Me");
        assert_eq!(s.kind, SelectorKind::Text);

        let s = normalize_selector("\"Submit\"");
        assert_eq!(s.raw, "text=Submit");
        assert_eq!(s.kind, SelectorKind::Text);

        let s = normalize_selector("button:has-text(\"Go\")");
        assert_eq!(s.kind, SelectorKind::Text);

        let s = normalize_selector("role=button");
        assert_eq!(s.kind, SelectorKind::Role);
        let s = normalize_selector("div[role=menu]");
        assert_eq!(s.kind, SelectorKind::Role);

        let s = normalize_selector("[data-testid=submit]");
        assert_eq!(s.kind, SelectorKind::Testid);

        let s = normalize_selector("#btn");
        assert_eq!(s.raw, "#btn");
        assert_eq!(s.kind, SelectorKind::Css);
    }

    #[tokio::test]
    async fn invalid_button_names_parameter_and_values() {
        let (_, sessions) = mock_session_manager();
        let skill = ClickElement::new(sessions);

        let err = skill
            .call(
                &RequestContext::default(),
                &args(json!({"selector": "#btn", "button": "diagonal"})),
            )
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("button"));
        assert!(message.contains("left, right, middle"));
    }

    #[tokio::test]
    async fn clicks_after_visibility_wait() {
        let (driver, sessions) = mock_session_manager();
        let skill = ClickElement::new(sessions);

        let ctx = RequestContext::for_task("task-1");
        let response = skill
            .call(&ctx, &args(json!({"selector": "#btn", "click_count": 2})))
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["selector_type"], "css");
        assert_eq!(parsed["click_count"], 2);

        let actions = driver.last_page().unwrap().actions();
        assert!(matches!(actions[0], MockAction::WaitFor { .. }));
        assert_eq!(
            actions[1],
            MockAction::Click {
                selector: "#btn".into()
            }
        );
    }

    #[tokio::test]
    async fn hidden_element_is_not_actionable() {
        let (driver, sessions) = mock_session_manager();
        let skill = ClickElement::new(Arc::clone(&sessions));

        let ctx = RequestContext::for_task("task-2");
        sessions.task_session(&ctx).await.unwrap();
        driver.last_page().unwrap().set_selector_hidden("#ghost");

        let err = skill
            .call(&ctx, &args(json!({"selector": "#ghost"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ElementNotActionable { .. }));
    }

    #[tokio::test]
    async fn iframe_presence_lands_in_error() {
        let (driver, sessions) = mock_session_manager();
        let skill = ClickElement::new(Arc::clone(&sessions));

        let ctx = RequestContext::for_task("task-3");
        sessions.task_session(&ctx).await.unwrap();
        let page = driver.last_page().unwrap();
        page.set_selector_hidden("#framed");
        page.set_count_for_selector("iframe", 2);

        let err = skill
            .call(&ctx, &args(json!({"selector": "#framed"})))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("2 iframes"));
        assert!(message.contains("cross-frame"));
    }

    #[tokio::test]
    async fn force_skips_visibility_wait() {
        let (driver, sessions) = mock_session_manager();
        let skill = ClickElement::new(Arc::clone(&sessions));

        let ctx = RequestContext::for_task("task-4");
        sessions.task_session(&ctx).await.unwrap();
        driver.last_page().unwrap().set_selector_hidden("#ghost");

        let response = skill
            .call(&ctx, &args(json!({"selector": "#ghost", "force": true})))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(parsed["success"], true);

        let actions = driver.last_page().unwrap().actions();
        assert!(actions
            .iter()
            .all(|action| !matches!(action, MockAction::WaitFor { .. })));
    }
}
