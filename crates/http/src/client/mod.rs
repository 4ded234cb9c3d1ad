//! Authenticated Fitmarket API client
//!
//! Every request passes through the same two hooks. Before sending, the
//! loading indicator is shown (unless the request opts out) and the stored
//! access token is attached as a bearer credential. After receiving, a
//! success is handed back untouched; a 401 on a request's first attempt
//! triggers a token refresh and one replay with the new token; anything else
//! is returned to the caller as-is.

pub mod auth;
pub mod config;
pub mod error;
pub mod loading;
pub mod refresh;
pub mod session;
pub mod store;

use config::ClientConfig;
use error::ClientError;
use loading::{LoadingGuard, LoadingIndicator, NoopIndicator};
use refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
use reqwest::{Client, ClientBuilder, Method, Request, Response, StatusCode, header};
use serde::{Serialize, de::DeserializeOwned};
use session::{Navigator, NoopNavigator, SessionManager};
use std::sync::Arc;
use std::time::Duration;
use store::{MemoryStore, SessionStore};
use tracing::{debug, trace};

/// Per-request options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Do not signal the loading indicator for this request
    pub suppress_loading: bool,
}

impl RequestOptions {
    /// Options for background polling: no loading indicator
    pub fn background() -> Self {
        Self {
            suppress_loading: true,
        }
    }
}

/// Which pass through the pipeline a request is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

/// Fitmarket API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    login_path: String,
    session: SessionManager,
    loading: Arc<dyn LoadingIndicator>,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a new client with default configuration and in-memory storage
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Session credentials and events
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Token refresh state
    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a request builder for a path relative to the base URL
    ///
    /// Authorization is added when the request is sent.
    pub fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Send a request through the pipeline
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        self.send_with(request, RequestOptions::default()).await
    }

    /// Send a request through the pipeline with explicit options
    ///
    /// Non-2xx statuses are returned as errors. The response of a successful
    /// request is returned unchanged.
    pub async fn send_with(
        &self,
        request: reqwest::RequestBuilder,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        let _loading = LoadingGuard::start(&self.loading, options.suppress_loading);
        let request = request.build()?;
        self.dispatch(request).await
    }

    async fn dispatch(&self, mut request: Request) -> Result<Response, ClientError> {
        let mut attempt = Attempt::First;

        loop {
            self.authorize(&mut request)?;

            let replay = match attempt {
                Attempt::First => request.try_clone(),
                Attempt::Retry => None,
            };

            trace!(method = %request.method(), url = %request.url(), ?attempt, "Sending request");
            let response = self.client.execute(request).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED && attempt == Attempt::First {
                if let Some(mut replay) = replay {
                    debug!(url = %response.url(), "Access token rejected, refreshing");
                    let token = self.refresh.refresh().await?;
                    set_bearer(&mut replay, &token)?;
                    request = replay;
                    attempt = Attempt::Retry;
                    continue;
                }
                debug!(url = %response.url(), "Request body cannot be replayed, returning 401");
            }

            return Err(status_error(response).await);
        }
    }

    /// Attach the stored access token, if any
    fn authorize(&self, request: &mut Request) -> Result<(), ClientError> {
        if let Some(token) = self.session.access_token() {
            set_bearer(request, &token)?;
        }
        Ok(())
    }

    /// Execute a request and deserialize the JSON response
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        self.execute_with(request, RequestOptions::default()).await
    }

    /// Execute a request with explicit options and deserialize the JSON response
    pub async fn execute_with<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let response = self.send_with(request, options).await?;
        Ok(response.json().await?)
    }

    /// GET a path and deserialize the JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(self.request(Method::GET, path)).await
    }

    /// POST a JSON body to a path and deserialize the JSON response
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.execute(self.request(Method::POST, path).json(body))
            .await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

fn set_bearer(request: &mut Request, token: &str) -> Result<(), ClientError> {
    let mut value = header::HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ClientError::Configuration(format!("Invalid access token: {e}")))?;
    value.set_sensitive(true);
    request.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(())
}

async fn status_error(response: Response) -> ClientError {
    let status = response.status();
    let message = response.text().await.unwrap_or_else(|_| status.to_string());
    ClientError::from_status(status, message)
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    config: ClientConfig,
    base_url: Option<String>,
    timeout: Option<Duration>,
    store: Option<Arc<dyn SessionStore>>,
    loading: Option<Arc<dyn LoadingIndicator>>,
    navigator: Option<Arc<dyn Navigator>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl ApiClientBuilder {
    /// Take every setting from a loaded configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.base_url = Some(config.base_url.clone());
        self.config = config;
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Set the refresh endpoint path
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    /// Set the login endpoint path
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.config.login_path = path.into();
        self
    }

    /// Set the session storage (defaults to [`MemoryStore`])
    pub fn session_store<S: SessionStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the loading indicator (defaults to [`NoopIndicator`])
    pub fn loading_indicator<L: LoadingIndicator + 'static>(mut self, indicator: Arc<L>) -> Self {
        self.loading = Some(indicator);
        self
    }

    /// Set the navigator used on forced logout (defaults to [`NoopNavigator`])
    pub fn navigator<N: Navigator + 'static>(mut self, navigator: Arc<N>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Replace the refresh transport (defaults to [`HttpTokenRefresher`])
    pub fn token_refresher<R: TokenRefresher + 'static>(mut self, refresher: Arc<R>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is empty".into()));
        }

        let mut client_builder = ClientBuilder::new().user_agent(self.config.user_agent.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            let timeout = self.timeout.unwrap_or_else(|| self.config.timeout());
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator));
        let session = SessionManager::new(store, navigator);

        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(HttpTokenRefresher::new(
                client.clone(),
                &base_url,
                &self.config.refresh_path,
            ))
        });

        Ok(ApiClient {
            client,
            base_url,
            login_path: self.config.login_path,
            session: session.clone(),
            loading: self.loading.unwrap_or_else(|| Arc::new(NoopIndicator)),
            refresh: Arc::new(RefreshCoordinator::new(refresher, session)),
        })
    }
}
