//! Dispatch error taxonomy
//!
//! Failures split into two classes: *fatal* (auth, project validation,
//! GraphQL misconfiguration - the run aborts) and *soft* (a sub-issue
//! query failing for one issue - degraded to "no sub-issues" with a
//! warning, handled in the resolver, never surfacing here).

use thiserror::Error;

/// Typed failure surfaced by project-tracker clients.
#[derive(Debug, Clone, Error)]
#[error("project tracker error [{code}]: {details}")]
pub struct ProjectsError {
    /// Stable machine-readable code (`PROJECT_NOT_FOUND`, `AUTH`, ...).
    pub code: String,
    /// Human-readable description.
    pub details: String,
}

impl ProjectsError {
    pub fn new(code: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            details: details.into(),
        }
    }
}

/// Errors aborting a dispatch run
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Missing or malformed configuration (environment variables).
    #[error("dispatch configuration error: {0}")]
    Config(String),

    /// Credentials rejected by the tracker.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Project validation or GraphQL failure. Fatal to the run.
    #[error(transparent)]
    Project(#[from] ProjectsError),

    /// HTTP transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Unexpected response shape from the tracker.
    #[error("unexpected tracker response: {0}")]
    Response(String),

    /// Matrix artifact could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn response(msg: impl Into<String>) -> Self {
        Self::Response(msg.into())
    }
}
