// Credential store
// In-memory session mirrored to durable storage

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;

use super::storage::{SessionStorage, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};
use super::types::Session;
use crate::models::User;

/// Owner of the session state
///
/// Reads never touch storage; writes go to storage first, then memory.
pub struct CredentialStore {
    storage: Arc<dyn SessionStorage>,
    session: RwLock<Session>,
}

impl CredentialStore {
    /// Rehydrate a store from durable storage
    ///
    /// Unreadable keys and a malformed user record are treated as absent.
    pub fn load(storage: Arc<dyn SessionStorage>) -> Self {
        let read = |key: &str| match storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!("Failed to read '{}' from session storage: {:#}", key, e);
                None
            }
        };

        let user = read(USER_KEY).and_then(|raw| match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Discarding malformed stored user record: {}", e);
                None
            }
        });

        let session = Session {
            access_token: read(TOKEN_KEY),
            refresh_token: read(REFRESH_TOKEN_KEY),
            user,
        };

        tracing::debug!(
            has_token = session.access_token.is_some(),
            has_refresh_token = session.refresh_token.is_some(),
            user_id = ?session.user_id(),
            "Session rehydrated"
        );

        Self {
            storage,
            session: RwLock::new(session),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.session.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.session.read().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.session.read().user.clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.session.read().user_id()
    }

    /// Copy of the whole session
    pub fn snapshot(&self) -> Session {
        self.session.read().clone()
    }

    /// Store a new access token, plus refresh token and user when provided
    ///
    /// Fields passed as `None` keep their current value.
    pub fn set_session(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user: Option<User>,
    ) -> Result<()> {
        self.storage
            .set(TOKEN_KEY, access_token)
            .context("Failed to persist access token")?;
        if let Some(refresh_token) = refresh_token {
            self.storage
                .set(REFRESH_TOKEN_KEY, refresh_token)
                .context("Failed to persist refresh token")?;
        }
        if let Some(ref user) = user {
            self.persist_user(user)?;
        }

        let mut session = self.session.write();
        session.access_token = Some(access_token.to_string());
        if let Some(refresh_token) = refresh_token {
            session.refresh_token = Some(refresh_token.to_string());
        }
        if user.is_some() {
            session.user = user;
        }
        Ok(())
    }

    /// Replace the stored user record alone
    pub fn set_user(&self, user: User) -> Result<()> {
        self.persist_user(&user)?;
        self.session.write().user = Some(user);
        Ok(())
    }

    /// Forget everything, in memory and on disk
    ///
    /// Storage failures are logged; memory is always cleared.
    pub fn clear(&self) {
        for key in [TOKEN_KEY, USER_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!("Failed to remove '{}' from session storage: {:#}", key, e);
            }
        }
        *self.session.write() = Session::default();
    }

    fn persist_user(&self, user: &User) -> Result<()> {
        let raw = serde_json::to_string(user).context("Failed to serialize user record")?;
        self.storage
            .set(USER_KEY, &raw)
            .context("Failed to persist user record")
    }
}
