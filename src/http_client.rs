use parking_lot::RwLock;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use crate::auth::{CredentialStore, RefreshCoordinator, SessionManager};
use crate::error::{Result, SessionError, TransportError};
use crate::models::{ApiEnvelope, PaginatedList, PaginationQuery};
use crate::navigation::Navigator;
use crate::transport::{bearer_value, ApiRequest, ApiResponse, Transport};

/// Request interceptor stage
///
/// Applies the default headers and the current bearer token to every request
/// before handing it to the transport. Never awaits anything but the transport.
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    default_headers: RwLock<HeaderMap>,
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<CredentialStore>) -> Self {
        Self {
            transport,
            store,
            default_headers: RwLock::new(HeaderMap::new()),
        }
    }

    /// Prepare an outbound request
    ///
    /// Default headers fill in what the request does not set itself; a stored
    /// access token always wins for `Authorization`.
    pub fn intercept(&self, mut request: ApiRequest) -> ApiRequest {
        for (name, value) in self.default_headers.read().iter() {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }
        if let Some(token) = self.store.access_token() {
            request.set_bearer(&token);
        }
        request
    }

    /// Send a request through the interceptor, with no 401 handling
    pub async fn dispatch(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let prepared = self.intercept(request.clone());
        self.transport.send(&prepared).await
    }

    pub fn set_default_bearer(&self, token: &str) {
        if let Some(value) = bearer_value(token) {
            self.default_headers.write().insert(AUTHORIZATION, value);
        }
    }

    pub fn clear_default_bearer(&self) {
        self.default_headers.write().remove(AUTHORIZATION);
    }

    pub fn default_headers(&self) -> HeaderMap {
        self.default_headers.read().clone()
    }
}

/// Authenticated API client
///
/// Automatically handles:
/// - bearer attachment from the credential store
/// - 401: one single-flight refresh, then one replay of the request
///
/// Replays after a shared refresh reach the transport in the order the
/// requests were queued.
pub struct ApiClient {
    pipeline: Arc<RequestPipeline>,
    session: Arc<SessionManager>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Wire a client around a transport, credential store and navigator
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
        refresh_timeout: Duration,
    ) -> Self {
        let pipeline = Arc::new(RequestPipeline::new(transport, store.clone()));
        let session = Arc::new(SessionManager::new(pipeline.clone(), store));
        let coordinator = Arc::new(RefreshCoordinator::new(
            session.clone(),
            navigator,
            refresh_timeout,
        ));

        Self {
            pipeline,
            session,
            coordinator,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    /// Execute a request, refreshing the token once on 401
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let err = match self.pipeline.dispatch(&request).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if !err.is_unauthorized() || request.retried {
            if err.is_unauthorized() {
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    "Received 401 on a retried request, giving up"
                );
            }
            return Err(err.into());
        }

        request.retried = true;

        // Another caller refreshed while this request was in flight
        if let Some(current) = self.session.store().access_token() {
            if err.request.bearer() != Some(current.as_str()) {
                tracing::debug!(
                    method = %request.method,
                    path = %request.path,
                    "Token rotated while in flight, replaying without refresh"
                );
                return Ok(self.pipeline.dispatch(&request).await?);
            }
        }

        tracing::warn!(
            method = %request.method,
            path = %request.path,
            "Received 401, refreshing token and retrying..."
        );

        let mut turn = self.coordinator.refreshed_token().await?;
        turn.wait().await;
        request.set_bearer(turn.token());

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            "Replaying request with refreshed token"
        );
        let replay = self.pipeline.dispatch(&request);
        tokio::pin!(replay);

        // Hand the request to the transport before the next queued caller goes
        let first_poll = std::future::poll_fn(|cx| Poll::Ready(replay.as_mut().poll(cx))).await;
        turn.pass();

        let response = match first_poll {
            Poll::Ready(result) => result,
            Poll::Pending => replay.await,
        };
        Ok(response?)
    }

    /// GET and decode the body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let request = ApiRequest::get(path).with_query(query.iter().cloned());
        self.execute(request).await?.json()
    }

    /// POST a JSON body and decode the response
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = ApiRequest::post(path, encode(body)?);
        self.execute(request).await?.json()
    }

    /// PUT a JSON body and decode the response
    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = ApiRequest::put(path, encode(body)?);
        self.execute(request).await?.json()
    }

    /// DELETE, optionally with a JSON body, and decode the response
    pub async fn delete_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let mut request = ApiRequest::delete(path);
        request.body = body;
        self.execute(request).await?.json()
    }

    /// Fetch one page of a list endpoint
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &PaginationQuery,
    ) -> Result<ApiEnvelope<PaginatedList<T>>> {
        self.get_json(path, &query.to_query()).await
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| SessionError::Encode(e.to_string()))
}
