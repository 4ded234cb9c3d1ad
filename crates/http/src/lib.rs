//! Fitmarket HTTP client
//!
//! An authenticated request pipeline for the Fitmarket REST API. Every request
//! made through [`client::ApiClient`] carries the stored bearer token, toggles
//! the application's loading indicator, and survives access-token expiry by
//! exchanging the refresh token once and replaying the request. Concurrent
//! requests that fail while a refresh is underway wait for that refresh
//! instead of starting their own.

pub mod client;
pub mod types;

pub use client::{
    ApiClient, ApiClientBuilder, RequestOptions,
    config::ClientConfig,
    error::{ClientError, RefreshError},
    loading::{CountingIndicator, LoadingIndicator, NoopIndicator},
    refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher},
    session::{LogoutReason, Navigator, NoopNavigator, SessionEvent, SessionManager},
    store::{ACCESS_TOKEN_KEY, MemoryStore, REFRESH_TOKEN_KEY, SessionStore, StoreError},
};

#[cfg(not(target_arch = "wasm32"))]
pub use client::store::FileStore;
