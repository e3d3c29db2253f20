//! Error types for abatrack-collector

use thiserror::Error;

/// Collector error type
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Transport-level failure (connection refused, timeout, DNS)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Store temporarily unreachable for a non-HTTP reason
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// An operation needs an active session and there is none
    #[error("No active session")]
    NoSession,

    /// The lifecycle state machine refused a transition
    #[error("Invalid session state: {0}")]
    State(String),
}

impl CollectorError {
    /// 4xx rejections are deterministic; retrying them cannot help.
    /// Transport failures and server-side errors (5xx) are transient
    /// and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            CollectorError::Transport(_) | CollectorError::Unavailable(_) => true,
            CollectorError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for collector operations
pub type Result<T> = std::result::Result<T, CollectorError>;
