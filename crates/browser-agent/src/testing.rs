//! Testing infrastructure: a scriptable in-memory driver.
//!
//! [`MockDriver`] implements the driver facade without spawning a browser.
//! Every launch produces a fresh [`MockPage`] with its own cookie and
//! navigation state, which is what makes the isolation tests meaningful.
//! Configure expected responses with the `set_*` methods, then assert on
//! the recorded [`MockAction`] sequence.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use browser_driver::{
    BrowserConfig, BrowserOps, ClickOptions, ContextOps, Driver, DriverError, DriverHandles,
    ExtractorSpec, FormField, PageOps, Result as DriverResult, ScreenshotOptions, ScrollRequest,
    Selector, WaitCondition, WaitState, WaitUntil,
};
use serde_json::Value;

/// Action recorded by [`MockPage`] for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
    Navigate { url: String },
    Click { selector: String },
    Fill { selector: String, value: String },
    Extract { fields: usize },
    Screenshot { path: String },
    Evaluate { script: String },
    WaitFor { condition: String },
    Scroll,
}

#[derive(Default)]
struct MockPageState {
    url: String,
    cookie: String,
    actions: Vec<MockAction>,
    eval_results: Vec<(String, Value)>,
    extract_result: Option<String>,
    hidden_selectors: Vec<String>,
    failing_selectors: Vec<String>,
    counts: Vec<(String, usize)>,
    screenshot_bytes: Vec<u8>,
    fail_navigation: Option<String>,
}

/// In-memory page double. One per launched session.
pub struct MockPage {
    state: Mutex<MockPageState>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockPageState {
                url: "about:blank".to_string(),
                screenshot_bytes: vec![0x89, 0x50, 0x4E, 0x47],
                ..MockPageState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockPageState> {
        self.state.lock().expect("mock page poisoned")
    }

    pub fn set_cookie(&self, cookie: &str) {
        self.lock().cookie = cookie.to_string();
    }

    pub fn cookie(&self) -> String {
        self.lock().cookie.clone()
    }

    pub fn set_eval_result(&self, script_fragment: &str, result: Value) {
        self.lock()
            .eval_results
            .push((script_fragment.to_string(), result));
    }

    /// Raw result the extract operation returns (canonical JSON or the
    /// legacy textual mapping form).
    pub fn set_extract_result(&self, raw: &str) {
        self.lock().extract_result = Some(raw.to_string());
    }

    /// Marks a selector as never becoming visible.
    pub fn set_selector_hidden(&self, selector: &str) {
        self.lock().hidden_selectors.push(selector.to_string());
    }

    /// Makes fills against this selector fail.
    pub fn set_selector_failing(&self, selector: &str) {
        self.lock().failing_selectors.push(selector.to_string());
    }

    pub fn set_count_for_selector(&self, selector: &str, count: usize) {
        self.lock().counts.push((selector.to_string(), count));
    }

    pub fn set_screenshot_bytes(&self, bytes: Vec<u8>) {
        self.lock().screenshot_bytes = bytes;
    }

    pub fn fail_navigation(&self, message: &str) {
        self.lock().fail_navigation = Some(message.to_string());
    }

    pub fn url_now(&self) -> String {
        self.lock().url.clone()
    }

    pub fn actions(&self) -> Vec<MockAction> {
        self.lock().actions.clone()
    }

    fn record(&self, action: MockAction) {
        self.lock().actions.push(action);
    }
}

#[async_trait]
impl PageOps for MockPage {
    async fn navigate(&self, url: &str, _wait_until: WaitUntil, _timeout: Duration) -> DriverResult<()> {
        self.record(MockAction::Navigate {
            url: url.to_string(),
        });
        let mut state = self.lock();
        if let Some(message) = state.fail_navigation.clone() {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                message,
            });
        }
        state.url = url.to_string();
        // A page that hands out cookies on this path, for isolation tests.
        if url.contains("set-cookie") {
            state.cookie = "session_token=abc123".to_string();
        }
        Ok(())
    }

    async fn click(&self, selector: &Selector, _options: &ClickOptions) -> DriverResult<()> {
        self.record(MockAction::Click {
            selector: selector.raw.clone(),
        });
        if self.lock().failing_selectors.contains(&selector.raw) {
            return Err(DriverError::ElementNotFound {
                selector: selector.raw.clone(),
            });
        }
        Ok(())
    }

    async fn fill_field(&self, field: &FormField) -> DriverResult<()> {
        self.record(MockAction::Fill {
            selector: field.selector.clone(),
            value: field.value.clone(),
        });
        if self.lock().failing_selectors.contains(&field.selector) {
            return Err(DriverError::ElementNotFound {
                selector: field.selector.clone(),
            });
        }
        Ok(())
    }

    async fn extract(&self, extractors: &[ExtractorSpec]) -> DriverResult<String> {
        self.record(MockAction::Extract {
            fields: extractors.len(),
        });
        if let Some(raw) = self.lock().extract_result.clone() {
            return Ok(raw);
        }
        let mut out = serde_json::Map::new();
        for spec in extractors {
            if spec.multiple {
                out.insert(spec.name.clone(), Value::Array(Vec::new()));
            } else {
                out.insert(spec.name.clone(), Value::String(String::new()));
            }
        }
        Ok(Value::Object(out).to_string())
    }

    async fn screenshot(&self, path: &Path, _options: &ScreenshotOptions) -> DriverResult<()> {
        self.record(MockAction::Screenshot {
            path: path.display().to_string(),
        });
        let bytes = self.lock().screenshot_bytes.clone();
        std::fs::write(path, bytes)?;
        Ok(())
    }

    async fn evaluate(&self, script: &str, _args: &[Value], _timeout: Duration) -> DriverResult<Value> {
        self.record(MockAction::Evaluate {
            script: script.to_string(),
        });
        let state = self.lock();
        for (fragment, result) in &state.eval_results {
            if script.contains(fragment.as_str()) {
                return Ok(result.clone());
            }
        }
        if script.contains("document.cookie") {
            return Ok(Value::String(state.cookie.clone()));
        }
        Ok(Value::Null)
    }

    async fn wait_for(&self, condition: &WaitCondition, timeout: Duration) -> DriverResult<()> {
        let label = match condition {
            WaitCondition::Selector { selector, state } => {
                format!("selector:{}:{:?}", selector.raw, state)
            }
            WaitCondition::Function { .. } => "function".to_string(),
            WaitCondition::Sleep => "sleep".to_string(),
        };
        self.record(MockAction::WaitFor { condition: label });

        if let WaitCondition::Selector { selector, state } = condition {
            let hidden = self.lock().hidden_selectors.contains(&selector.raw);
            let satisfied = match state {
                WaitState::Visible | WaitState::Attached => !hidden,
                WaitState::Hidden | WaitState::Detached => hidden,
            };
            if !satisfied {
                return Err(DriverError::Timeout {
                    ms: timeout.as_millis() as u64,
                    condition: format!("selector {}", selector.raw),
                });
            }
        }
        if matches!(condition, WaitCondition::Sleep) {
            tokio::time::sleep(timeout).await;
        }
        Ok(())
    }

    async fn scroll(&self, _request: &ScrollRequest) -> DriverResult<()> {
        self.record(MockAction::Scroll);
        Ok(())
    }

    async fn count_elements(&self, css: &str) -> DriverResult<usize> {
        let state = self.lock();
        Ok(state
            .counts
            .iter()
            .find(|(selector, _)| selector == css)
            .map(|(_, count)| *count)
            .unwrap_or(0))
    }

    async fn url(&self) -> DriverResult<String> {
        Ok(self.lock().url.clone())
    }
}

struct MockBrowser {
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserOps for MockBrowser {
    async fn close(&self) -> DriverResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockContext;

#[async_trait]
impl ContextOps for MockContext {
    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }
}

/// Session manager over a fresh [`MockDriver`], for skill tests.
pub fn mock_session_manager() -> (Arc<MockDriver>, Arc<crate::session::SessionManager>) {
    let driver = Arc::new(MockDriver::new());
    let manager = crate::session::SessionManager::new(
        Arc::clone(&driver) as Arc<dyn Driver>,
        BrowserConfig::default(),
        Duration::from_secs(60),
        Duration::from_secs(60),
    );
    (driver, manager)
}

/// Scriptable driver; launches produce independent mock pages.
pub struct MockDriver {
    launches: AtomicUsize,
    closes: Arc<AtomicUsize>,
    pages: Mutex<Vec<Arc<MockPage>>>,
    fail_next_launch: Mutex<Option<String>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            launches: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            pages: Mutex::new(Vec::new()),
            fail_next_launch: Mutex::new(None),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Browser-handle closes observed so far.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn fail_next_launch(&self, message: &str) {
        *self.fail_next_launch.lock().expect("mock driver poisoned") = Some(message.to_string());
    }

    /// Pages created so far, in launch order.
    pub fn pages(&self) -> Vec<Arc<MockPage>> {
        self.pages.lock().expect("mock driver poisoned").clone()
    }

    pub fn last_page(&self) -> Option<Arc<MockPage>> {
        self.pages().last().cloned()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn launch(&self, _config: &BrowserConfig) -> DriverResult<DriverHandles> {
        if let Some(message) = self.fail_next_launch.lock().expect("mock driver poisoned").take() {
            return Err(DriverError::Launch(message));
        }

        self.launches.fetch_add(1, Ordering::SeqCst);
        let page = Arc::new(MockPage::new());
        self.pages
            .lock()
            .expect("mock driver poisoned")
            .push(Arc::clone(&page));

        Ok(DriverHandles {
            browser: Arc::new(MockBrowser {
                closes: Arc::clone(&self.closes),
            }),
            context: Arc::new(MockContext),
            page,
        })
    }

    async fn shutdown(&self) -> DriverResult<()> {
        Ok(())
    }
}
