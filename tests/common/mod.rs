// Shared test helpers: an in-process transport with scripted auth behaviour

#![allow(dead_code)]

use admin_session::auth::{
    CredentialStore, MemoryStorage, SessionStorage, LOGIN_PATH, REFRESH_PATH,
};
use admin_session::models::User;
use admin_session::navigation::RouteTracker;
use admin_session::transport::{ApiRequest, ApiResponse, Transport};
use admin_session::{ApiClient, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// How the refresh endpoint answers
#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    /// Issue a new token pair
    Issue { token: String, refresh_token: String },
    /// Answer with isSuccess=false
    Reject,
    /// Never answer
    Hang,
}

/// A request the transport saw, with the bearer it carried
#[derive(Clone, Debug, PartialEq)]
pub struct Seen {
    pub path: String,
    pub bearer: Option<String>,
}

/// Transport that accepts exactly one bearer token at a time
pub struct ScriptedTransport {
    valid_token: Mutex<String>,
    refresh_outcome: Mutex<RefreshOutcome>,
    accept_refreshed: bool,
    refresh_gate: Option<Arc<Notify>>,
    refresh_calls: AtomicUsize,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedTransport {
    pub fn new(valid_token: &str, outcome: RefreshOutcome) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            refresh_outcome: Mutex::new(outcome),
            accept_refreshed: true,
            refresh_gate: None,
            refresh_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Hold refresh responses until the gate is notified
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.refresh_gate = Some(gate);
        self
    }

    /// Keep rejecting even the refreshed token
    pub fn rejecting_refreshed_tokens(mut self) -> Self {
        self.accept_refreshed = false;
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Non-auth requests in arrival order
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    fn ok(body: serde_json::Value) -> ApiResponse {
        ApiResponse {
            status: 200,
            headers: HeaderMap::new(),
            body,
        }
    }

    async fn answer_refresh(&self) -> Result<ApiResponse, TransportError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.refresh_gate {
            gate.notified().await;
        }

        let outcome = self.refresh_outcome.lock().clone();
        match outcome {
            RefreshOutcome::Issue {
                token,
                refresh_token,
            } => {
                if self.accept_refreshed {
                    *self.valid_token.lock() = token.clone();
                }
                Ok(Self::ok(json!({
                    "isSuccess": true,
                    "data": {"token": token, "refreshToken": refresh_token}
                })))
            }
            RefreshOutcome::Reject => Ok(Self::ok(json!({
                "isSuccess": false,
                "message": "Refresh token expired"
            }))),
            RefreshOutcome::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        if request.path == REFRESH_PATH {
            return self.answer_refresh().await;
        }
        if request.path == LOGIN_PATH {
            let token = self.valid_token.lock().clone();
            return Ok(Self::ok(json!({
                "isSuccess": true,
                "data": {"token": token, "refreshToken": "R1", "user": {"id": 5}}
            })));
        }

        let bearer = request.bearer().map(str::to_string);
        self.seen.lock().push(Seen {
            path: request.path.clone(),
            bearer: bearer.clone(),
        });

        if bearer.as_deref() == Some(self.valid_token.lock().as_str()) {
            Ok(Self::ok(json!({"path": request.path, "token": bearer})))
        } else {
            Err(TransportError::http(
                request.clone(),
                401,
                "Unauthorized".to_string(),
                None,
            ))
        }
    }
}

/// Everything a test needs to poke at
pub struct Harness {
    pub client: ApiClient,
    pub transport: Arc<ScriptedTransport>,
    pub storage: Arc<dyn SessionStorage>,
    pub navigator: Arc<RouteTracker>,
}

/// Client holding an expired session: token T1, refresh token R1, user 5
pub fn harness(transport: ScriptedTransport, route: &str, refresh_timeout: Duration) -> Harness {
    let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::new());
    let store = Arc::new(CredentialStore::load(storage.clone()));
    store
        .set_session("T1", Some("R1"), Some(User::new(5)))
        .expect("seed session");

    let transport = Arc::new(transport);
    let navigator = Arc::new(RouteTracker::new(route));
    let client = ApiClient::new(
        transport.clone(),
        store,
        navigator.clone(),
        refresh_timeout,
    );

    Harness {
        client,
        transport,
        storage,
        navigator,
    }
}

/// Notify `gate` once `expected` callers are queued behind the refresh
pub async fn open_when_queued(client: &ApiClient, gate: &Notify, expected: usize) {
    while client.coordinator().queued() < expected {
        tokio::task::yield_now().await;
    }
    gate.notify_one();
}
