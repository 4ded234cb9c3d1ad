//! Wire types for the authentication endpoints

use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of the token-refresh call
///
/// The backend has accepted the refresh token under both field names over
/// time, so the same value is sent under each.
#[derive(Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
    pub refresh_token: String,
}

impl RefreshRequest {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        let refresh_token = refresh_token.into();
        Self {
            refresh: refresh_token.clone(),
            refresh_token,
        }
    }
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Token pair returned by the login and refresh endpoints
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// New access token
    #[serde(alias = "access_token")]
    pub access: String,
    /// Rotated refresh token, when the backend issues one
    #[serde(default, alias = "refresh_token", skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl TokenResponse {
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh,
        }
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Login request body
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
