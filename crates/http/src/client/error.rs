//! Client error types

use super::store::StoreError;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error; no response was received
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The access token could not be renewed
    #[error("Token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// Session storage could not be written
    #[error("Session storage error: {0}")]
    Store(#[from] StoreError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

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
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// HTTP status carried by this error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::AuthenticationFailed(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::ServerError { status, .. } => Some(*status),
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the server rejected the request as unauthenticated
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    /// Whether the request never produced a response (connect failure, timeout)
    ///
    /// A body that fails to decode after a 2xx is not a network error.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Request(err) if err.is_connect() || err.is_timeout() || err.is_request()
        )
    }

    /// Whether the session was ended as a consequence of this error
    ///
    /// Every refresh failure forces a logout.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Refresh(_))
    }
}

/// Failure of a token refresh cycle
///
/// Cloneable because a single failure is handed to every request waiting on
/// the same refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// No refresh token is stored
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// The refresh endpoint answered with an error status
    #[error("Refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The refresh endpoint could not be reached
    #[error("Refresh request failed: {0}")]
    Transport(String),

    /// The refresh endpoint answered without a usable access token
    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    /// The refreshed token could not be persisted
    #[error("Failed to persist refreshed token: {0}")]
    Storage(String),
}
