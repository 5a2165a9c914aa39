// Authentication types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::User;

/// Login endpoint, relative to the API base URL
pub const LOGIN_PATH: &str = "/management-accounts/login";

/// Refresh-token endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "/management-accounts/refresh-token";

/// In-memory authentication state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl Session {
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn user_role(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.role.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

/// Login request body
#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Refresh request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub user_id: i64,
}

/// Token payload pulled out of a login or refresh response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthPayload {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl AuthPayload {
    /// Normalize a response body into an `AuthPayload`
    ///
    /// Each field is looked up under `data` first, then at the top level.
    /// Empty strings count as absent. A user record that does not parse is dropped.
    pub fn from_body(body: &Value) -> Self {
        let data = body.get("data").filter(|d| d.is_object());
        let lookup = |key: &str| -> Option<&Value> {
            data.and_then(|d| d.get(key))
                .filter(|v| !v.is_null())
                .or_else(|| body.get(key).filter(|v| !v.is_null()))
        };
        let string = |key: &str| {
            lookup(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let user = lookup("user").and_then(|v| match serde_json::from_value::<User>(v.clone()) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Ignoring malformed user record in auth response: {}", e);
                None
            }
        });

        Self {
            token: string("token"),
            refresh_token: string("refreshToken"),
            user,
        }
    }
}
