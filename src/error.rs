// Error handling module
// Defines the transport and session error taxonomy

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::transport::ApiRequest;

/// Failure at the HTTP layer
///
/// Carries the original request descriptor so the caller can replay it verbatim.
#[derive(Error, Debug, Clone)]
#[error("{} {} failed ({kind}): {message}", .request.method, .request.path)]
pub struct TransportError {
    /// HTTP status, absent for network-level failures
    pub status: Option<u16>,

    /// Error category: http_status, timeout, connection_failed, request_error,
    /// body_error, decode_error or unknown
    pub kind: &'static str,

    /// Human readable description (server body text for HTTP errors)
    pub message: String,

    /// Parsed response body, if the server sent one
    pub body: Option<Value>,

    /// Request that produced this error
    pub request: ApiRequest,
}

impl TransportError {
    /// Error for a non-2xx response
    pub fn http(request: ApiRequest, status: u16, message: String, body: Option<Value>) -> Self {
        Self {
            status: Some(status),
            kind: "http_status",
            message,
            body,
            request,
        }
    }

    /// Error for a request that never produced a response
    pub fn network(request: ApiRequest, kind: &'static str, message: String) -> Self {
        Self {
            status: None,
            kind,
            message,
            body: None,
            request,
        }
    }

    /// True for 401 Unauthorized
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

/// Errors surfaced by the session layer
///
/// `Clone` so a single refresh failure can be handed to every queued caller.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// Network or HTTP failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Refresh attempted without a stored refresh token or user id
    #[error("No refresh token or user ID available")]
    MissingCredentials,

    /// Server declined the refresh or returned no token
    #[error("Token refresh rejected: {0}")]
    RefreshRejected(String),

    /// Refresh call did not settle in time
    #[error("Token refresh timed out after {0:?}")]
    RefreshTimeout(Duration),

    /// The caller running the refresh went away before it finished
    #[error("Token refresh was abandoned before completing")]
    RefreshAbandoned,

    /// Persisting the session failed
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Request body could not be serialized
    #[error("Failed to encode request body: {0}")]
    Encode(String),

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl SessionError {
    /// HTTP status of the underlying transport failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SessionError::Transport(e) => e.status,
            _ => None,
        }
    }

    /// True when the error came from a failed refresh attempt
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            SessionError::MissingCredentials
                | SessionError::RefreshRejected(_)
                | SessionError::RefreshTimeout(_)
                | SessionError::RefreshAbandoned
        )
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_message() {
        let err = TransportError::http(
            ApiRequest::get("/countries"),
            404,
            "Not found".to_string(),
            None,
        );
        assert_eq!(err.to_string(), "GET /countries failed (http_status): Not found");
        assert_eq!(err.status, Some(404));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_network_error_has_no_status() {
        let err = TransportError::network(
            ApiRequest::get("/countries"),
            "timeout",
            "operation timed out".to_string(),
        );
        assert_eq!(err.status, None);
        assert_eq!(err.kind, "timeout");
    }

    #[test]
    fn test_unauthorized_detection() {
        let err = TransportError::http(ApiRequest::get("/me"), 401, String::new(), None);
        assert!(err.is_unauthorized());

        let session_err = SessionError::from(err);
        assert_eq!(session_err.status(), Some(401));
        assert!(!session_err.is_refresh_failure());
    }

    #[test]
    fn test_session_error_messages() {
        assert_eq!(
            SessionError::MissingCredentials.to_string(),
            "No refresh token or user ID available"
        );
        assert_eq!(
            SessionError::RefreshRejected("expired".to_string()).to_string(),
            "Token refresh rejected: expired"
        );
        assert_eq!(
            SessionError::RefreshTimeout(Duration::from_secs(5)).to_string(),
            "Token refresh timed out after 5s"
        );
        assert_eq!(
            SessionError::RefreshAbandoned.to_string(),
            "Token refresh was abandoned before completing"
        );
    }

    #[test]
    fn test_refresh_failure_classification() {
        assert!(SessionError::MissingCredentials.is_refresh_failure());
        assert!(SessionError::RefreshRejected(String::new()).is_refresh_failure());
        assert!(SessionError::RefreshTimeout(Duration::from_millis(1)).is_refresh_failure());
        assert!(!SessionError::Decode(String::new()).is_refresh_failure());
        assert_eq!(SessionError::Storage("disk".to_string()).status(), None);
    }
}
