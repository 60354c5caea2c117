//! Client error types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed and could not be recovered
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Exchanging the refresh credential failed; the session is gone
    #[error("Session refresh failed: {0}")]
    RefreshFailed(RefreshFailure),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflicting state on the server
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Server-side validation rejected the payload
    #[error("Unprocessable entity: {0}")]
    Unprocessable(String),

    /// Input rejected before any request was sent
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Refresh credential store failure
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            422 => Self::Unprocessable(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Wrap a client-side validation failure
    pub fn invalid_input(err: config::ConfigError) -> Self {
        Self::InvalidInput(err.to_string())
    }

    /// Whether this error means the session is no longer usable and the
    /// user has to sign in again
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::RefreshFailed(_))
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Why a refresh exchange failed.
///
/// Cloneable so the same failure can be delivered to every request that was
/// waiting on the refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshFailure {
    /// HTTP status from the refresh endpoint, `None` for transport failures
    pub status: Option<u16>,
    pub message: String,
}

impl RefreshFailure {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "refresh endpoint returned {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RefreshFailure {}

/// Refresh credential store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cookie entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ClientError::from_status(StatusCode::UNAUTHORIZED, "expired".into()),
            ClientError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "bad pin".into()),
            ClientError::Unprocessable(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_GATEWAY, "upstream".into()),
            ClientError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn test_refresh_failure_display() {
        let failure = RefreshFailure::status(401, "invalid refresh token");
        assert_eq!(
            failure.to_string(),
            "refresh endpoint returned 401: invalid refresh token"
        );
        assert_eq!(
            RefreshFailure::transport("connection refused").to_string(),
            "connection refused"
        );
        assert!(ClientError::RefreshFailed(failure).is_auth_expired());
    }
}
