//! Narrow facade over a browser-automation backend.
//!
//! The session manager owns one [`DriverHandles`] triple per session; the
//! context handle is the isolation boundary between sessions. Callers only
//! ever see the capability traits below, so a test double can stand in for
//! the real browser (see `browser_agent::testing`).
//!
//! Destruction order is page, then context, then browser. Every operation
//! that can block on the browser takes an explicit timeout.

pub mod cdp;
pub mod error;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use error::{DriverError, Result};
pub use types::*;

/// The owning triple behind one browser session.
///
/// Handles are cheap to clone; clones address the same underlying browser
/// objects. The registry must never hold a partially-populated triple.
#[derive(Clone)]
pub struct DriverHandles {
    pub browser: Arc<dyn BrowserOps>,
    pub context: Arc<dyn ContextOps>,
    pub page: Arc<dyn PageOps>,
}

impl std::fmt::Debug for DriverHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandles").finish_non_exhaustive()
    }
}

/// Driver entry point: launches sessions and owns backend process state.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Launches a browser, an isolated context, and a page.
    ///
    /// On failure, any partially-created handles are closed (in reverse
    /// creation order) before the error is returned.
    async fn launch(&self, config: &BrowserConfig) -> Result<DriverHandles>;

    /// Tears down backend process state. Idempotent.
    async fn shutdown(&self) -> Result<()>;
}

/// Browser-process-level handle.
#[async_trait]
pub trait BrowserOps: Send + Sync {
    /// Closes the browser process. Tolerates an already-closed browser.
    async fn close(&self) -> Result<()>;
}

/// Isolated-context-level handle. Distinct contexts share no cookies,
/// storage, cache, or history.
#[async_trait]
pub trait ContextOps: Send + Sync {
    /// Disposes the context and everything in it. Tolerates an
    /// already-closed context.
    async fn close(&self) -> Result<()>;
}

/// Page-level operations. One page is not safe for concurrent use; callers
/// serialise access per session.
#[async_trait]
pub trait PageOps: Send + Sync {
    async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()>;

    async fn click(&self, selector: &Selector, options: &ClickOptions) -> Result<()>;

    async fn fill_field(&self, field: &FormField) -> Result<()>;

    /// Runs the extractor list and returns the raw result: a canonical JSON
    /// object mapping extractor names to values.
    async fn extract(&self, extractors: &[ExtractorSpec]) -> Result<String>;

    /// Captures a screenshot and writes it to `path`.
    async fn screenshot(&self, path: &std::path::Path, options: &ScreenshotOptions) -> Result<()>;

    /// Evaluates a script (a function body; `arguments` holds `args`) and
    /// returns the value as JSON.
    async fn evaluate(&self, script: &str, args: &[Value], timeout: Duration) -> Result<Value>;

    async fn wait_for(&self, condition: &WaitCondition, timeout: Duration) -> Result<()>;

    async fn scroll(&self, request: &ScrollRequest) -> Result<()>;

    /// Counts elements matching a CSS selector (iframe diagnostics).
    async fn count_elements(&self, css: &str) -> Result<usize>;

    /// Current page URL, as the browser reports it.
    async fn url(&self) -> Result<String>;
}

/// Runs an authentication flow on a page using the primitive operations.
///
/// Lives here rather than on [`PageOps`] so mocks get it for free.
pub async fn authenticate(page: &dyn PageOps, request: &AuthRequest) -> Result<()> {
    let timeout = Duration::from_secs(30);

    match request.kind {
        AuthKind::Basic | AuthKind::Oauth => {
            let url = request.login_url.as_deref().ok_or_else(|| {
                DriverError::Protocol(format!("{:?} auth requires a login_url", request.kind))
            })?;
            page.navigate(url, WaitUntil::Load, timeout).await
        }
        AuthKind::Form => {
            if let Some(url) = request.login_url.as_deref() {
                page.navigate(url, WaitUntil::Load, timeout).await?;
            }
            if let Some(selector) = request.username_selector.as_deref() {
                page.fill_field(&FormField {
                    selector: selector.to_string(),
                    value: request.username.clone(),
                    kind: FieldKind::Text,
                    multiple: false,
                })
                .await?;
            }
            if let Some(selector) = request.password_selector.as_deref() {
                page.fill_field(&FormField {
                    selector: selector.to_string(),
                    value: request.password.clone(),
                    kind: FieldKind::Password,
                    multiple: false,
                })
                .await?;
            }
            if let Some(selector) = request.submit_selector.as_deref() {
                page.click(&Selector::css(selector), &ClickOptions::default())
                    .await?;
            }
            Ok(())
        }
    }
}
