//! Auth API.
//!
//! Login and registration establish the session from the token pair the
//! server returns; logout always clears the local session, even when the
//! server cannot be reached.

use crate::client::{ApiRequest, LarderClient};
use crate::error::{Error, Result};
use crate::types::{AuthPayload, LoginRequest, RegisterRequest, UpdateProfileRequest, User};

/// Auth API client.
pub struct AuthApi {
    client: LarderClient,
}

impl AuthApi {
    pub(crate) fn new(client: LarderClient) -> Self {
        Self { client }
    }

    /// Create an account and start a session for it.
    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        let request = ApiRequest::post("auth/register").json(&request)?;
        let payload: AuthPayload = self.client.execute(request).await?;
        self.client.establish_session(payload.tokens).await?;
        tracing::info!(user_id = %payload.user.id, "registered");
        Ok(payload.user)
    }

    /// Log in and start a session.
    pub async fn login(&self, request: LoginRequest) -> Result<User> {
        let request = ApiRequest::post("auth/login").json(&request)?;
        let payload: AuthPayload = self.client.execute(request).await?;
        self.client.establish_session(payload.tokens).await?;
        tracing::info!(user_id = %payload.user.id, "logged in");
        Ok(payload.user)
    }

    /// Log out on the server, then drop the local session.
    pub async fn logout(&self) -> Result<()> {
        if let Err(e) = self
            .client
            .execute_unit(ApiRequest::post("auth/logout"))
            .await
        {
            tracing::warn!(error = %e, "server logout failed, clearing local session anyway");
        }
        self.client.end_session().await?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Get the current user's profile.
    pub async fn profile(&self) -> Result<User> {
        self.client.execute(ApiRequest::get("auth/profile")).await
    }

    /// Update the current user's profile.
    pub async fn update_profile(&self, request: UpdateProfileRequest) -> Result<User> {
        let request = ApiRequest::put("auth/profile").json(&request)?;
        self.client.execute(request).await
    }

    /// Restore a persisted session.
    ///
    /// Returns `None` when there is no session or the server no longer
    /// accepts it (the stale tokens are cleared and `LoggedOut` or `Expired`
    /// is emitted). Transport and server
    /// errors are returned without touching the session.
    pub async fn check(&self) -> Result<Option<User>> {
        if self.client.token_store().access_token().await.is_none() {
            return Ok(None);
        }

        match self.profile().await {
            Ok(user) => Ok(Some(user)),
            Err(Error::SessionExpired(reason)) => {
                tracing::debug!(%reason, "persisted session is no longer valid");
                Ok(None)
            }
            Err(Error::Auth(message)) => {
                tracing::debug!(%message, "persisted session rejected");
                self.client.end_session().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
