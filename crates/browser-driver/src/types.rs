//! Value types shared between the driver facade and its callers.
//!
//! The session manager and the skills speak these types; adapter-specific
//! option structs never leak out of the adapter module.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Browser engine selection. The choice is dispatched once, at launch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Chromium,
    Firefox,
    Webkit,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::Chromium
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Chromium => write!(f, "chromium"),
            Engine::Firefox => write!(f, "firefox"),
            Engine::Webkit => write!(f, "webkit"),
        }
    }
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Engine::Chromium),
            "firefox" => Ok(Engine::Firefox),
            "webkit" => Ok(Engine::Webkit),
            other => Err(format!("unknown browser engine: {other}")),
        }
    }
}

/// Launch-time browser configuration.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub engine: Engine,
    pub headless: bool,
    pub launch_timeout: Duration,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Extra command-line arguments handed to the browser process.
    pub args: Vec<String>,
    pub context: ContextOptions,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Chromium,
            headless: true,
            launch_timeout: Duration::from_secs(30),
            viewport_width: 1920,
            viewport_height: 1080,
            args: vec![
                "--disable-dev-shm-usage".into(),
                "--no-sandbox".into(),
                "--disable-blink-features=AutomationControlled".into(),
                "--no-first-run".into(),
                "--disable-default-apps".into(),
                "--disable-extensions".into(),
                "--disable-sync".into(),
                "--hide-scrollbars".into(),
                "--mute-audio".into(),
            ],
            context: ContextOptions::default(),
        }
    }
}

/// Options applied to the isolated browser context of a session.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub user_agent: Option<String>,
    /// Extra headers sent with every request (Accept-Language and friends).
    pub extra_headers: Vec<(String, String)>,
    pub java_script_enabled: bool,
    pub bypass_csp: bool,
}

/// Navigation completion condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Domcontentloaded,
    Load,
    Networkidle,
}

impl Default for WaitUntil {
    fn default() -> Self {
        WaitUntil::Load
    }
}

/// Locator strategy derived from selector normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Css,
    Xpath,
    Text,
    Role,
    Testid,
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::Css => write!(f, "css"),
            SelectorKind::Xpath => write!(f, "xpath"),
            SelectorKind::Text => write!(f, "text"),
            SelectorKind::Role => write!(f, "role"),
            SelectorKind::Testid => write!(f, "testid"),
        }
    }
}

/// A normalised selector: the rewritten selector string plus its strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub raw: String,
    pub kind: SelectorKind,
}

impl Selector {
    pub fn css(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            kind: SelectorKind::Css,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl Default for MouseButton {
    fn default() -> Self {
        MouseButton::Left
    }
}

#[derive(Debug, Clone)]
pub struct ClickOptions {
    pub button: MouseButton,
    pub click_count: u32,
    pub force: bool,
    pub timeout: Duration,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            click_count: 1,
            force: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Form field kinds the fill operation understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Password,
    Select,
    Checkbox,
    Radio,
    File,
}

impl Default for FieldKind {
    fn default() -> Self {
        FieldKind::Text
    }
}

/// A single form field to fill.
#[derive(Debug, Clone)]
pub struct FormField {
    pub selector: String,
    pub value: String,
    pub kind: FieldKind,
    /// Select fields only: multi-select, value is comma-separated.
    pub multiple: bool,
}

/// One extraction instruction for the extract operation.
#[derive(Debug, Clone)]
pub struct ExtractorSpec {
    pub name: String,
    pub selector: String,
    /// `text` for innerText, anything else is read as an attribute.
    pub attribute: String,
    pub multiple: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl Default for ImageFormat {
    fn default() -> Self {
        ImageFormat::Png
    }
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    pub full_page: bool,
    /// Element screenshot when set.
    pub selector: Option<Selector>,
    pub format: ImageFormat,
    /// Only honoured for jpeg.
    pub quality: Option<u32>,
}

/// Element state a selector wait can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl Default for WaitState {
    fn default() -> Self {
        WaitState::Visible
    }
}

/// Driver-level wait instruction. Skill-level conditions (navigation,
/// networkidle, ...) are lowered onto these three by the dispatch layer.
#[derive(Debug, Clone)]
pub enum WaitCondition {
    Selector { selector: Selector, state: WaitState },
    Function { body: String },
    Sleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

impl Default for ScrollBehavior {
    fn default() -> Self {
        ScrollBehavior::Smooth
    }
}

impl ScrollBehavior {
    pub fn as_js(&self) -> &'static str {
        match self {
            ScrollBehavior::Smooth => "smooth",
            ScrollBehavior::Instant => "instant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollAlignment {
    Start,
    Center,
    End,
    Nearest,
}

impl ScrollAlignment {
    pub fn as_js(&self) -> &'static str {
        match self {
            ScrollAlignment::Start => "start",
            ScrollAlignment::Center => "center",
            ScrollAlignment::End => "end",
            ScrollAlignment::Nearest => "nearest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
    Top,
    Bottom,
}

/// Assembled scroll instruction.
#[derive(Debug, Clone)]
pub enum ScrollRequest {
    Page {
        direction: Option<ScrollDirection>,
        amount: i64,
        behavior: ScrollBehavior,
    },
    Element {
        selector: Selector,
        behavior: ScrollBehavior,
        block: ScrollAlignment,
        inline: ScrollAlignment,
    },
    Coordinates {
        x: i64,
        y: i64,
        behavior: ScrollBehavior,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Basic,
    Form,
    Oauth,
}

/// Authentication flow handed to the driver.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub kind: AuthKind,
    pub username: String,
    pub password: String,
    pub login_url: Option<String>,
    pub username_selector: Option<String>,
    pub password_selector: Option<String>,
    pub submit_selector: Option<String>,
}
