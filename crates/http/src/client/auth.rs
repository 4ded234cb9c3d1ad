//! Login and logout

use super::loading::LoadingGuard;
use super::session::SessionEvent;
use super::{ApiClient, ClientError, status_error};
use crate::types::{LoginRequest, TokenResponse};
use tracing::info;

impl ApiClient {
    /// Exchange credentials for a token pair and persist it
    ///
    /// Goes straight to the transport: a 401 here means bad credentials and
    /// must not trigger a refresh.
    pub async fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<(), ClientError> {
        let _loading = LoadingGuard::start(&self.loading, false);

        let username = username.into();
        let body = LoginRequest {
            username: username.clone(),
            password: password.into(),
        };

        let response = self
            .client
            .post(self.url(&self.login_path))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let tokens: TokenResponse = response.json().await?;
        self.session
            .store_tokens(&tokens.access, tokens.refresh.as_deref())?;
        self.session.emit(SessionEvent::LoggedIn);

        info!(%username, "Logged in");
        Ok(())
    }

    /// End the session: clear stored state and return to the login view
    pub fn logout(&self) {
        self.session.logout();
    }
}
