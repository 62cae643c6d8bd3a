//! handle_authentication: drive basic, form, and oauth login flows.
//!
//! Credentials are used for the page interaction only; they are never
//! echoed into the response or the logs.

use std::sync::Arc;

use async_trait::async_trait;
use browser_driver::{AuthKind, AuthRequest};
use serde_json::{json, Map, Value};
use tracing::info;

use super::args;
use super::navigate::normalize_url;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::error::{AgentError, Result};
use crate::session::SessionManager;

const AUTH_TYPES: &[&str] = &["basic", "form", "oauth"];

pub struct HandleAuthentication {
    sessions: Arc<SessionManager>,
    descriptor: SkillDescriptor,
}

impl HandleAuthentication {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let descriptor = SkillDescriptor {
            name: "handle_authentication",
            description:
                "Handle various authentication scenarios including basic auth, OAuth, and custom login forms",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new("type", ParamKind::String, "Authentication type")
                        .with_enum(AUTH_TYPES),
                    ParamField::new(
                        "username",
                        ParamKind::String,
                        "Username or email for authentication",
                    ),
                    ParamField::new("password", ParamKind::String, "Password for authentication"),
                    ParamField::new(
                        "login_url",
                        ParamKind::String,
                        "URL of the login page for form authentication",
                    ),
                    ParamField::new(
                        "username_selector",
                        ParamKind::String,
                        "Selector for username field in form authentication",
                    ),
                    ParamField::new(
                        "password_selector",
                        ParamKind::String,
                        "Selector for password field in form authentication",
                    ),
                    ParamField::new(
                        "submit_selector",
                        ParamKind::String,
                        "Selector for submit button in form authentication",
                    ),
                ],
                vec!["type"],
            ),
        };
        Self {
            sessions,
            descriptor,
        }
    }
}

#[async_trait]
impl Skill for HandleAuthentication {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let auth_type = args::req_enum(args, "type", AUTH_TYPES)?;
        let username = args::opt_str(args, "username")?.unwrap_or_default().to_string();
        let password = args::opt_str(args, "password")?.unwrap_or_default().to_string();
        let login_url = match args::opt_str(args, "login_url")? {
            Some(url) if !url.is_empty() => Some(normalize_url(url)?),
            _ => None,
        };
        let username_selector = args::opt_str(args, "username_selector")?.map(str::to_string);
        let password_selector = args::opt_str(args, "password_selector")?.map(str::to_string);
        let submit_selector = args::opt_str(args, "submit_selector")?.map(str::to_string);

        let kind = match auth_type {
            "basic" => AuthKind::Basic,
            "oauth" => AuthKind::Oauth,
            _ => AuthKind::Form,
        };

        if matches!(kind, AuthKind::Basic | AuthKind::Oauth) && login_url.is_none() {
            return Err(AgentError::invalid(
                "login_url",
                format!("is required for {auth_type} authentication"),
            ));
        }

        info!(
            target = "agent.skills",
            auth_type,
            login_url = login_url.as_deref().unwrap_or(""),
            "handling authentication"
        );

        let session = self.sessions.task_session(ctx).await?;
        let request = AuthRequest {
            kind,
            username,
            password,
            login_url: login_url.clone(),
            username_selector,
            password_selector,
            submit_selector,
        };

        browser_driver::authenticate(session.page.as_ref(), &request)
            .await
            .map_err(|e| AgentError::driver("handle_authentication", e))?;

        info!(
            target = "agent.skills",
            auth_type,
            session_id = %session.id,
            "authentication flow completed"
        );

        let response = json!({
            "success": true,
            "type": auth_type,
            "login_url": login_url.unwrap_or_default(),
            "session_id": session.id,
            "message": "Authentication flow completed successfully",
        });
        Ok(response.to_string())
    }
}
