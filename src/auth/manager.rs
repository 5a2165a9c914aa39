use std::sync::Arc;

use serde_json::Value;

use super::credentials::CredentialStore;
use super::types::{AuthPayload, LoginCredentials, RefreshRequest, LOGIN_PATH, REFRESH_PATH};
use crate::error::{Result, SessionError};
use crate::http_client::RequestPipeline;
use crate::models::{AccountType, ApiEnvelope, User};
use crate::transport::{ApiRequest, ApiResponse};

/// Session facade
/// Login, logout and token refresh on top of the credential store
///
/// Calls made here go through the request pipeline but never through the
/// 401 refresh handling, so a failing refresh cannot queue behind itself.
pub struct SessionManager {
    pipeline: Arc<RequestPipeline>,
    store: Arc<CredentialStore>,
}

impl SessionManager {
    pub fn new(pipeline: Arc<RequestPipeline>, store: Arc<CredentialStore>) -> Self {
        // Rehydrated sessions start with the bearer already in the defaults
        if let Some(token) = store.access_token() {
            pipeline.set_default_bearer(&token);
        }
        Self { pipeline, store }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// True when an access token is held
    pub fn is_authenticated(&self) -> bool {
        self.store.access_token().is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.store.user()
    }

    /// Log in with email and password
    ///
    /// The returned user is tagged as a management account. The raw response is
    /// returned so callers can inspect the envelope themselves.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<ApiResponse> {
        tracing::info!("Logging in as {}", credentials.email);

        let body = serde_json::to_value(credentials).map_err(|e| SessionError::Encode(e.to_string()))?;
        let response = self.pipeline.dispatch(&ApiRequest::post(LOGIN_PATH, body)).await?;

        let payload = AuthPayload::from_body(&response.body);
        let user = payload
            .user
            .map(|u| u.with_account_type(AccountType::Management));

        match (payload.token, user) {
            (Some(token), user) => {
                self.set_session(&token, payload.refresh_token.as_deref(), user)?;
                tracing::info!(user_id = ?self.store.user_id(), "Login successful");
            }
            (None, Some(user)) => {
                tracing::warn!("Login response carried a user but no token");
                self.store
                    .set_user(user)
                    .map_err(|e| SessionError::Storage(format!("{:#}", e)))?;
            }
            (None, None) => tracing::warn!("Login response carried neither token nor user"),
        }

        Ok(response)
    }

    /// Exchange the stored refresh token for a new access token
    ///
    /// Every failure clears the session before the error is returned.
    pub async fn refresh(&self) -> Result<String> {
        let result = self.try_refresh().await;
        if let Err(ref e) = result {
            tracing::error!("Token refresh failed: {}", e);
            self.logout();
        }
        result
    }

    async fn try_refresh(&self) -> Result<String> {
        let session = self.store.snapshot();
        let (refresh_token, previous_user) = match (session.refresh_token, session.user) {
            (Some(token), Some(user)) => (token, user),
            _ => return Err(SessionError::MissingCredentials),
        };

        tracing::debug!(user_id = previous_user.id, "Refreshing access token...");

        let request = RefreshRequest {
            refresh_token,
            user_id: previous_user.id,
        };
        let body = serde_json::to_value(&request).map_err(|e| SessionError::Encode(e.to_string()))?;
        let response = self.pipeline.dispatch(&ApiRequest::post(REFRESH_PATH, body)).await?;

        let envelope: ApiEnvelope<Value> = response
            .json()
            .unwrap_or(ApiEnvelope { is_success: false, message: None, data: None });
        let message = envelope.message.clone();
        let data = match envelope.into_data() {
            Some(data) => data,
            None => {
                return Err(SessionError::RefreshRejected(
                    message.unwrap_or_else(|| "Refresh failed or no token returned".to_string()),
                ))
            }
        };

        let payload = AuthPayload::from_body(&data);
        let token = payload.token.ok_or_else(|| {
            SessionError::RefreshRejected("Refresh failed or no token returned".to_string())
        })?;

        // Keep the classification the user signed in with
        let account_type = previous_user
            .account_type
            .unwrap_or(AccountType::Management);
        let user = payload.user.map(|u| u.with_account_type(account_type));

        self.set_session(&token, payload.refresh_token.as_deref(), user)?;
        tracing::info!("Access token refreshed");
        Ok(token)
    }

    /// Drop the session and the default bearer header
    pub fn logout(&self) {
        self.store.clear();
        self.pipeline.clear_default_bearer();
        tracing::info!("Logged out");
    }

    fn set_session(&self, token: &str, refresh_token: Option<&str>, user: Option<User>) -> Result<()> {
        self.store
            .set_session(token, refresh_token, user)
            .map_err(|e| SessionError::Storage(format!("{:#}", e)))?;
        self.pipeline.set_default_bearer(token);
        Ok(())
    }
}
