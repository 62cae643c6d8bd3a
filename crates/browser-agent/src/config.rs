//! Process configuration, sourced from environment variables.
//!
//! Every knob has a documented default; there are no positional arguments.
//! Variables share the `BROWSER_AGENT_` prefix.

use std::path::PathBuf;
use std::time::Duration;

use browser_driver::{BrowserConfig, ContextOptions, Engine};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub engine: Engine,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
    pub accept_language: String,
    pub extra_args: Vec<String>,
    pub launch_timeout: Duration,
    pub data_dir: PathBuf,
    pub session_timeout: Duration,
    pub sweep_interval: Duration,
    pub virtual_display: bool,
    pub port: u16,
    pub artifacts_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: Engine::Chromium,
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            extra_args: Vec::new(),
            launch_timeout: Duration::from_secs(30),
            data_dir: PathBuf::from("/tmp/browser-agent"),
            session_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(120),
            virtual_display: false,
            port: 8080,
            artifacts_port: 8081,
        }
    }
}

impl Config {
    /// Reads configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            engine: env_parse("BROWSER_AGENT_ENGINE", defaults.engine),
            headless: env_parse("BROWSER_AGENT_HEADLESS", defaults.headless),
            viewport_width: env_parse("BROWSER_AGENT_VIEWPORT_WIDTH", defaults.viewport_width),
            viewport_height: env_parse("BROWSER_AGENT_VIEWPORT_HEIGHT", defaults.viewport_height),
            user_agent: env_string("BROWSER_AGENT_USER_AGENT", &defaults.user_agent),
            accept_language: env_string("BROWSER_AGENT_ACCEPT_LANGUAGE", &defaults.accept_language),
            extra_args: std::env::var("BROWSER_AGENT_EXTRA_ARGS")
                .map(|raw| raw.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            launch_timeout: Duration::from_secs(env_parse(
                "BROWSER_AGENT_LAUNCH_TIMEOUT_SECS",
                defaults.launch_timeout.as_secs(),
            )),
            data_dir: std::env::var("BROWSER_AGENT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            session_timeout: Duration::from_secs(env_parse(
                "BROWSER_AGENT_SESSION_TIMEOUT_SECS",
                defaults.session_timeout.as_secs(),
            )),
            sweep_interval: Duration::from_secs(env_parse(
                "BROWSER_AGENT_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            virtual_display: env_parse("BROWSER_AGENT_VIRTUAL_DISPLAY", defaults.virtual_display),
            port: env_parse("BROWSER_AGENT_PORT", defaults.port),
            artifacts_port: env_parse("BROWSER_AGENT_ARTIFACTS_PORT", defaults.artifacts_port),
        }
    }

    /// The browser configuration every session is launched with.
    pub fn browser_config(&self) -> BrowserConfig {
        let mut config = BrowserConfig {
            engine: self.engine,
            headless: self.headless,
            launch_timeout: self.launch_timeout,
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            context: ContextOptions {
                user_agent: Some(self.user_agent.clone()),
                extra_headers: vec![
                    ("Accept-Language".to_string(), self.accept_language.clone()),
                    ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
                ],
                java_script_enabled: true,
                bypass_csp: true,
            },
            ..BrowserConfig::default()
        };
        config.args.extend(self.extra_args.iter().cloned());
        config
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.engine, Engine::Chromium);
        assert_eq!(config.session_timeout, Duration::from_secs(600));
        assert_eq!(config.sweep_interval, Duration::from_secs(120));
        assert_eq!(config.port, 8080);
        assert_eq!(config.artifacts_port, 8081);
    }

    #[test]
    fn browser_config_carries_context_options() {
        let config = Config::default().browser_config();
        assert!(config.context.bypass_csp);
        assert!(config.context.java_script_enabled);
        assert!(config.context.user_agent.is_some());
        assert!(config
            .context
            .extra_headers
            .iter()
            .any(|(name, _)| name == "Accept-Language"));
    }
}
