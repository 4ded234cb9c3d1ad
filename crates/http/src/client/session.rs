//! Session credentials, forced logout and session events

use super::store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SessionStore, StoreError};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// A refresh was needed but no refresh token was stored
    MissingRefreshToken,
    /// The refresh endpoint rejected the refresh token or could not be reached
    RefreshFailed,
    /// The user logged out
    UserRequested,
}

/// Notifications published to session observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    TokenRefreshed,
    LoggedOut { reason: LogoutReason },
}

/// Client-side navigation used by forced logout
pub trait Navigator: Send + Sync {
    /// Whether the login view is already showing
    fn is_on_login_view(&self) -> bool;

    /// Navigate to the login view
    fn redirect_to_login(&self);
}

/// Navigator for headless use; never navigates
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn is_on_login_view(&self) -> bool {
        false
    }

    fn redirect_to_login(&self) {}
}

/// Owner of the persisted credentials
///
/// Reads are open to every request. Writes come from login and from the
/// refresh procedure.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            navigator,
            events,
        }
    }

    /// Current access token
    pub fn access_token(&self) -> Option<String> {
        self.store.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Current refresh token
    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Whether any credential is stored
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some() || self.refresh_token().is_some()
    }

    /// Persist a full credential set, as returned by login
    pub fn store_tokens(&self, access: &str, refresh: Option<&str>) -> Result<(), StoreError> {
        self.store.set(ACCESS_TOKEN_KEY, access)?;
        match refresh {
            Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh),
            None => self.store.remove(REFRESH_TOKEN_KEY),
        }
    }

    /// Persist the outcome of a refresh; a rotated refresh token replaces the old one
    pub(crate) fn store_refreshed(
        &self,
        access: &str,
        rotated_refresh: Option<&str>,
    ) -> Result<(), StoreError> {
        self.store.set(ACCESS_TOKEN_KEY, access)?;
        if let Some(refresh) = rotated_refresh {
            self.store.set(REFRESH_TOKEN_KEY, refresh)?;
        }
        Ok(())
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Discard all client-side state and return to the login view
    ///
    /// A hard reset: storage is cleared entirely, including cached entities.
    pub fn force_logout(&self, reason: LogoutReason) {
        warn!(?reason, "Ending session");

        if let Err(e) = self.store.clear() {
            warn!("Failed to clear session storage: {e}");
        }

        if self.navigator.is_on_login_view() {
            debug!("Already on login view, not redirecting");
        } else {
            self.navigator.redirect_to_login();
        }

        self.emit(SessionEvent::LoggedOut { reason });
    }

    /// User-initiated logout
    pub fn logout(&self) {
        info!("Logging out");
        self.force_logout(LogoutReason::UserRequested);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("authenticated", &self.is_authenticated())
            .field("observers", &self.events.receiver_count())
            .finish()
    }
}
