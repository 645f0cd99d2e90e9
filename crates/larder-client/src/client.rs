//! Main client implementation and the authenticated request pipeline.
//!
//! Every call goes through [`LarderClient::send`]:
//!
//! 1. the current access token (if any) is attached as a bearer credential;
//! 2. any response other than `401 Unauthorized` is returned untouched;
//! 3. a `401` on a request that carried a credential triggers one refresh
//!    followed by exactly one retry with the rotated token;
//! 4. if the session cannot be recovered the token store is cleared, a
//!    [`SessionEvent::Expired`] is broadcast and
//!    [`Error::SessionExpired`] is returned.
//!
//! Refreshes are single-flight per client: concurrent requests that all hit
//! `401` wait on the same guard, and only the first one talks to the refresh
//! endpoint.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::{AuthApi, DashboardApi, RecipesApi};
use crate::error::{Error, ErrorResponse, Result};
use crate::events::{ExpiryReason, SessionEvent, SessionEvents};
use crate::session::{MemoryTokenStore, SessionStatus, SharedTokenStore, TokenPair};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URL used by [`LarderClient::localhost`].
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Path of the token refresh endpoint, relative to the base URL.
const REFRESH_PATH: &str = "auth/refresh";

/// Larder API client.
///
/// Cheap to clone; clones share the token store, the refresh guard and the
/// session event channel.
///
/// # Example
///
/// ```no_run
/// use larder_client::{LarderClient, LoginRequest};
///
/// # async fn example() -> larder_client::Result<()> {
/// let client = LarderClient::builder()
///     .base_url("http://localhost:8080/api")
///     .build()?;
///
/// client
///     .auth()
///     .login(LoginRequest::new("cook@example.com", "hunter22"))
///     .await?;
///
/// let page = client.recipes().list(&Default::default()).await?;
/// println!("{} recipes", page.pagination.total);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LarderClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for LarderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LarderClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    /// HTTP client.
    pub(crate) http: reqwest::Client,
    /// Base URL for API requests.
    pub(crate) base_url: Url,
    /// Request timeout.
    pub(crate) timeout: Duration,
    /// Credential storage.
    pub(crate) store: SharedTokenStore,
    /// Session lifecycle notifications.
    pub(crate) events: SessionEvents,
    /// Held while a refresh is in flight.
    refresh_guard: Mutex<()>,
}

/// Where a single call is in its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Original dispatch; a 401 may still be recovered.
    First,
    /// Already retried once after a refresh; a 401 is final.
    Retried,
}

/// Description of an API call, rebuildable for the retry.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append query parameters from any struct that serializes to a flat
    /// object. `None` fields are skipped.
    pub fn query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Result<Self> {
        match serde_json::to_value(query)? {
            serde_json::Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        serde_json::Value::Null => {}
                        serde_json::Value::String(s) => self.query.push((key, s)),
                        other => self.query.push((key, other.to_string())),
                    }
                }
                Ok(self)
            }
            serde_json::Value::Null => Ok(self),
            _ => Err(Error::Validation(
                "query parameters must serialize to an object".to_string(),
            )),
        }
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Success envelope used by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Payload of `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
struct RefreshPayload {
    tokens: TokenPair,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

impl LarderClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client pointing at a local development server.
    pub fn localhost() -> Result<Self> {
        Self::builder().base_url(DEFAULT_BASE_URL).build()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The token store backing this client.
    pub fn token_store(&self) -> &SharedTokenStore {
        &self.inner.store
    }

    /// Current authentication status.
    pub async fn status(&self) -> SessionStatus {
        self.inner.store.status().await
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the auth API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Access the recipes API.
    pub fn recipes(&self) -> RecipesApi {
        RecipesApi::new(self.clone())
    }

    /// Access the dashboard API.
    pub fn dashboard(&self) -> DashboardApi {
        DashboardApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request pipeline
    // ─────────────────────────────────────────────────────────────────────────

    /// Send a request through the authenticated pipeline.
    ///
    /// Non-401 responses, including other error statuses, are returned as
    /// they arrived. Transport errors are passed through.
    pub async fn send(&self, request: ApiRequest) -> Result<reqwest::Response> {
        let mut attempt = Attempt::First;
        let mut bearer = self.inner.store.access_token().await;

        loop {
            let response = self.dispatch(&request, bearer.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            // Nothing to refresh for a request that carried no credential.
            let Some(used) = bearer.take() else {
                return Ok(response);
            };

            match attempt {
                Attempt::Retried => {
                    tracing::debug!(
                        method = %request.method,
                        path = %request.path,
                        "rejected again after refresh, giving up"
                    );
                    return Ok(response);
                }
                Attempt::First => {
                    attempt = Attempt::Retried;
                    tracing::debug!(
                        method = %request.method,
                        path = %request.path,
                        "access token rejected, attempting refresh"
                    );
                    bearer = Some(self.recover(&used).await?);
                }
            }
        }
    }

    /// Like [`send`](Self::send), but aborts when `cancel` fires.
    ///
    /// Cancellation can land at any suspension point. The token store is
    /// only touched in a single step once a refresh body has been fully
    /// read, so it is never left half-updated.
    pub async fn send_cancellable(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let path = request.path.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(%path, "request cancelled");
                Err(Error::Cancelled)
            }
            result = self.send(request) => result,
        }
    }

    /// Send a request and decode the `data` field of the response envelope.
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.send(request).await?;
        self.handle_response(response).await
    }

    /// Send a request whose response body is irrelevant.
    pub async fn execute_unit(&self, request: ApiRequest) -> Result<()> {
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }
        Ok(())
    }

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = self.url(&request.path)?;
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            authenticated = bearer.is_some(),
            "dispatching request"
        );

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .timeout(self.inner.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        Ok(builder.send().await?)
    }

    /// Obtain a fresh access token after `rejected` was refused.
    async fn recover(&self, rejected: &str) -> Result<String> {
        let _guard = self.inner.refresh_guard.lock().await;

        let current = self.inner.store.credentials().await;
        if let Some(pair) = current.pair()
            && pair.access_token != rejected
        {
            tracing::debug!("access token already rotated by a concurrent request");
            return Ok(pair.access_token);
        }

        let Some(refresh_token) = current.refresh_token else {
            return Err(self.terminate(ExpiryReason::MissingRefreshToken).await);
        };

        match self.refresh(&refresh_token).await {
            Ok(pair) => {
                let access_token = pair.access_token.clone();
                self.inner.store.set_session(pair).await?;
                tracing::info!("access token refreshed");
                self.inner.events.emit(SessionEvent::Refreshed);
                Ok(access_token)
            }
            Err(reason) => Err(self.terminate(reason).await),
        }
    }

    /// Call the refresh endpoint directly, outside the pipeline.
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<TokenPair, ExpiryReason> {
        let url = self.url(REFRESH_PATH).map_err(refresh_failed)?;
        let response = self
            .inner
            .http
            .post(url)
            .json(&RefreshRequest { refresh_token })
            .timeout(self.inner.timeout)
            .send()
            .await
            .map_err(refresh_failed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExpiryReason::RefreshRejected {
                status: status.as_u16(),
            });
        }

        let envelope: Envelope<RefreshPayload> = response.json().await.map_err(refresh_failed)?;
        let tokens = envelope.data.tokens;
        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(ExpiryReason::RefreshFailed {
                message: "refresh response contained an empty token".to_string(),
            });
        }
        Ok(tokens)
    }

    /// End the session after an unrecoverable authorization failure.
    ///
    /// Runs under the refresh guard, so the snapshot taken before clearing
    /// cannot race another teardown.
    async fn terminate(&self, reason: ExpiryReason) -> Error {
        let had_tokens = !self.inner.store.credentials().await.is_empty();
        let cleared = match self.inner.store.clear_session().await {
            Ok(cleared) => cleared,
            Err(e) => {
                // Stores drop their in-memory session before reporting
                // persistence failures, so the session still ended.
                tracing::warn!(error = %e, "failed to persist cleared session after expiry");
                had_tokens
            }
        };

        if cleared {
            tracing::warn!(%reason, "session expired");
            self.inner.events.emit(SessionEvent::Expired {
                reason: reason.clone(),
            });
        } else {
            tracing::debug!(%reason, "session already cleared");
        }
        Error::SessionExpired(reason)
    }

    /// Replace the session after a login or registration.
    pub(crate) async fn establish_session(&self, tokens: TokenPair) -> Result<()> {
        self.inner.store.set_session(tokens).await?;
        self.inner.events.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Drop the session at the user's request.
    ///
    /// `LoggedOut` is emitted even when the store fails to persist the
    /// removal, since the in-memory session is already gone.
    pub(crate) async fn end_session(&self) -> Result<()> {
        let cleared = self.inner.store.clear_session().await;
        self.inner.events.emit(SessionEvent::LoggedOut);
        cleared.map(|_| ())
    }

    /// Handle a response, extracting the envelope payload or error.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            let envelope: Envelope<T> = response.json().await?;
            Ok(envelope.data)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let message = response
            .json::<ErrorResponse>()
            .await
            .unwrap_or_default()
            .into_message(status);

        match status {
            401 => Error::Auth(message),
            404 => Error::NotFound(message),
            _ => Error::Api { status, message },
        }
    }
}

fn refresh_failed(e: impl std::fmt::Display) -> ExpiryReason {
    ExpiryReason::RefreshFailed {
        message: e.to_string(),
    }
}

/// Builder for creating a LarderClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    token_store: Option<SharedTokenStore>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            token_store: None,
        }
    }

    /// Set the base URL for the server, including any API prefix.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use the given token store. Defaults to an in-memory store.
    pub fn token_store(mut self, store: SharedTokenStore) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<LarderClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("larder-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        let store = self
            .token_store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));

        Ok(LarderClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
                store,
                events: SessionEvents::new(),
                refresh_guard: Mutex::new(()),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = ClientBuilder::new().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_normalizes_trailing_slash() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:8080/api")
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/api/");

        let client = ClientBuilder::new()
            .base_url("http://localhost:8080/api/")
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/api/");
    }

    #[test]
    fn test_url_building() {
        let client = LarderClient::localhost().unwrap();

        let url = client.url("recipes").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/recipes");

        let url = client.url("/auth/refresh").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/auth/refresh");
    }

    #[test]
    fn test_request_query_skips_none() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Filters {
            search: Option<String>,
            max_prep_time: Option<u32>,
            page: u32,
        }

        let request = ApiRequest::get("recipes")
            .query(&Filters {
                search: None,
                max_prep_time: Some(30),
                page: 2,
            })
            .unwrap();

        assert_eq!(
            request.query,
            vec![
                ("maxPrepTime".to_string(), "30".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_request_query_rejects_scalars() {
        let result = ApiRequest::get("recipes").query(&42);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_new_client_is_anonymous() {
        let client = LarderClient::localhost().unwrap();
        assert_eq!(client.status().await, SessionStatus::Anonymous);
    }
}
