use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced to callers of the session manager and token broker.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Session manager is closed")]
    Closed,
}

/// A failed login attempt. The session manager logs these and retries.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Bad request: {reason} ({code})")]
    BadRequest { code: i64, reason: String },

    #[error("Unexpected status code {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Login returned a token that already expired at {0}")]
    AlreadyExpired(DateTime<Utc>),
}
