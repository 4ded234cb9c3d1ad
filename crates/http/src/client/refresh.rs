//! Single-flight access token renewal
//!
//! At most one refresh call is outstanding at any time. The first request to
//! need a new token starts a shared flight; requests that need one while it
//! is in flight await the same flight and receive the same outcome. The state
//! goes back to `Idle` exactly once per cycle, when the flight settles.

use super::error::RefreshError;
use super::session::{LogoutReason, SessionEvent, SessionManager};
use crate::types::{RefreshRequest, TokenResponse};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Exchanges a refresh token for a new access token
///
/// Implementations must not route through the authenticated pipeline.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError>;
}

/// Calls the backend refresh endpoint with a bare HTTP client
#[derive(Clone, Debug)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenRefresher {
    pub fn new(client: reqwest::Client, base_url: &str, path: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        let response = self
            .client
            .post(&self.url)
            .json(&RefreshRequest::new(refresh_token))
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        if tokens.access.is_empty() {
            return Err(RefreshError::InvalidResponse(
                "empty access token".to_string(),
            ));
        }

        Ok(tokens)
    }
}

type Flight = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

enum RefreshState {
    Idle,
    Refreshing(Flight),
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coordinates token refreshes across concurrent requests
pub struct RefreshCoordinator {
    state: Arc<Mutex<RefreshState>>,
    refresher: Arc<dyn TokenRefresher>,
    session: SessionManager,
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn TokenRefresher>, session: SessionManager) -> Self {
        Self {
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            refresher,
            session,
        }
    }

    /// Whether a refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(*lock(&self.state), RefreshState::Refreshing(_))
    }

    /// Obtain a fresh access token
    ///
    /// Joins the in-flight refresh if there is one, otherwise starts one.
    /// The flight belongs to the coordinator, not to the caller that started
    /// it: any caller still awaiting it keeps it going, and a flight left with
    /// no callers resumes when the next one arrives. On failure the session is
    /// ended once, before any caller sees the error.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let flight = {
            let mut state = lock(&self.state);
            match &*state {
                RefreshState::Refreshing(flight) => {
                    debug!("Token refresh already in flight, waiting for it");
                    flight.clone()
                }
                RefreshState::Idle => {
                    let flight = run_cycle(
                        Arc::clone(&self.state),
                        Arc::clone(&self.refresher),
                        self.session.clone(),
                    )
                    .boxed()
                    .shared();
                    *state = RefreshState::Refreshing(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

/// One refresh cycle: exchange, persist, settle the session, back to `Idle`
///
/// Session side effects happen before the state is cleared, so a request
/// arriving in between joins this cycle instead of starting another with a
/// refresh token that is about to be discarded.
async fn run_cycle(
    state: Arc<Mutex<RefreshState>>,
    refresher: Arc<dyn TokenRefresher>,
    session: SessionManager,
) -> Result<String, RefreshError> {
    let outcome = exchange(refresher.as_ref(), &session).await;

    match &outcome {
        Ok(_) => {
            info!("Access token refreshed");
            session.emit(SessionEvent::TokenRefreshed);
        }
        Err(err) => {
            warn!("Token refresh failed: {err}");
            let reason = match err {
                RefreshError::MissingRefreshToken => LogoutReason::MissingRefreshToken,
                _ => LogoutReason::RefreshFailed,
            };
            session.force_logout(reason);
        }
    }

    *lock(&state) = RefreshState::Idle;
    outcome
}

async fn exchange(
    refresher: &dyn TokenRefresher,
    session: &SessionManager,
) -> Result<String, RefreshError> {
    let Some(refresh_token) = session.refresh_token() else {
        return Err(RefreshError::MissingRefreshToken);
    };

    debug!("Exchanging refresh token");
    let tokens = refresher.refresh(&refresh_token).await?;

    session
        .store_refreshed(&tokens.access, tokens.refresh.as_deref())
        .map_err(|e| RefreshError::Storage(e.to_string()))?;

    Ok(tokens.access)
}
