use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid parameter `{name}`: {expected}")]
    InvalidParameter { name: String, expected: String },

    #[error("script rejected: {0}")]
    SecurityRejected(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("session launch failed: {0}")]
    SessionLaunchFailed(#[source] browser_driver::DriverError),

    #[error("{skill} failed: {source}")]
    Driver {
        skill: &'static str,
        #[source]
        source: browser_driver::DriverError,
    },

    #[error("element not actionable: {reason}")]
    ElementNotActionable { reason: String },

    #[error("artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    #[error("agent is shutting down")]
    Shutdown,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn invalid(name: impl Into<String>, expected: impl Into<String>) -> Self {
        AgentError::InvalidParameter {
            name: name.into(),
            expected: expected.into(),
        }
    }

    /// Wraps a driver failure with the skill it occurred in.
    pub fn driver(skill: &'static str, source: browser_driver::DriverError) -> Self {
        AgentError::Driver { skill, source }
    }
}
