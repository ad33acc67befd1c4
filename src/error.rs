//! Error taxonomy surfaced to callers.
//!
//! Internal plumbing (database worker, migrations, file stores) works in
//! `anyhow::Result`; anything that crosses into a public operation is
//! converted into a [`FocusError`] so the UI can branch on [`ErrorKind`].

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    NotFound,
    Validation,
    Network,
    Parse,
    Storage,
}

#[derive(Error, Debug)]
pub enum FocusError {
    /// No account or token available for an operation that needs one.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The task-board API rejected the token (401/403).
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Remote resource absent (404) or local lookup miss.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A local business rule was violated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport-level failure reaching the task-board API.
    #[error("Network error: {0}")]
    Network(String),

    /// Body could not be decoded as JSON or did not match the schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local storage failure.
    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type FocusResult<T> = std::result::Result<T, FocusError>;

impl FocusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FocusError::Configuration(_) => ErrorKind::Configuration,
            FocusError::Authentication(_) => ErrorKind::Authentication,
            FocusError::NotFound(_) => ErrorKind::NotFound,
            FocusError::Validation(_) => ErrorKind::Validation,
            FocusError::Network(_) => ErrorKind::Network,
            FocusError::Parse(_) => ErrorKind::Parse,
            FocusError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        FocusError::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        FocusError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        FocusError::Validation(msg.into())
    }
}

impl From<serde_json::Error> for FocusError {
    fn from(err: serde_json::Error) -> Self {
        FocusError::Parse(err.to_string())
    }
}
