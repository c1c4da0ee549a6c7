//! Error types for the feed engine

use thiserror::Error;

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// Failure classification used by the engine to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller lost (or never had) authorization; downgrades the access gate
    Unauthorized,
    /// Target item no longer exists on the backing store
    NotFound,
    /// Network or server trouble; safe to retry
    Transient,
    /// Request rejected as malformed, locally or by the server
    Invalid,
}

/// Feed error types
///
/// Payloads are strings so errors can be cloned into snapshots handed to
/// the UI host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Credential missing, expired, or rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Item not found
    #[error("Item not found: {0}")]
    NotFound(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Server returned an unexpected status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Request rejected before or by the server
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    /// Classify this error for the engine's failure policy
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::Unauthorized(_) => ErrorKind::Unauthorized,
            FeedError::NotFound(_) => ErrorKind::NotFound,
            FeedError::Invalid(_) | FeedError::Config(_) => ErrorKind::Invalid,
            FeedError::Network(_) | FeedError::Server { .. } | FeedError::Serialization(_) => {
                ErrorKind::Transient
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Whether the UI should offer a retry
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Map an HTTP status and response body to an error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => FeedError::Unauthorized(message),
            404 => FeedError::NotFound(message),
            400 | 422 => FeedError::Invalid(message),
            _ => FeedError::Server { status, message },
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FeedError::from_status(status.as_u16(), err.to_string()),
            None => FeedError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(FeedError::from_status(401, "expired").kind(), ErrorKind::Unauthorized);
        assert_eq!(FeedError::from_status(403, "forbidden").kind(), ErrorKind::Unauthorized);
        assert_eq!(FeedError::from_status(404, "gone").kind(), ErrorKind::NotFound);
        assert_eq!(FeedError::from_status(422, "bad").kind(), ErrorKind::Invalid);
        assert_eq!(FeedError::from_status(503, "down").kind(), ErrorKind::Transient);
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(FeedError::Network("reset".into()).is_retryable());
        assert!(FeedError::Serialization("eof".into()).is_retryable());
        assert!(!FeedError::Unauthorized("expired".into()).is_retryable());
        assert!(!FeedError::NotFound("post 3".into()).is_retryable());
        assert!(!FeedError::Invalid("empty".into()).is_retryable());
    }
}
