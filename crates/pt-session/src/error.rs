//! Error types for the session layer

use thiserror::Error;

/// Session-level failures.
///
/// Cloneable so every caller attached to one shared refresh observes the
/// same outcome; backend and store causes are carried as messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Permission fetch failed: {0}")]
    PermissionFetchFailed(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("A session is already active")]
    AlreadyAuthenticated,

    #[error("Session was cancelled")]
    SessionCancelled,

    #[error("Auth backend error: {0}")]
    Backend(String),

    #[error("Session store error: {0}")]
    Store(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err.to_string())
    }
}

/// Auth backend call failures
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Credentials rejected")]
    InvalidCredentials,

    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Persistence failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt persisted value for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AuthError>;
