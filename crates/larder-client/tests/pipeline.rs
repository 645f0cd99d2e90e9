//! Integration tests for the authenticated request pipeline.
//!
//! Each test runs against a wiremock server that plays the Larder API,
//! so the exact number of refresh and retry calls can be asserted.

use std::sync::Arc;
use std::time::Duration;

use larder_client::{
    ApiRequest, CancellationToken, Credentials, Error, ExpiryReason, FileTokenStore, LarderClient,
    LoginRequest, MemoryTokenStore, RecipeQuery, SessionEvent, SessionStatus, SharedTokenStore,
    TokenPair, TokenStore,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn client_with(server: &MockServer, store: SharedTokenStore) -> LarderClient {
    LarderClient::builder()
        .base_url(format!("{}/api", server.uri()))
        .timeout(Duration::from_secs(5))
        .token_store(store)
        .build()
        .unwrap()
}

fn logged_in(access: &str, refresh: &str) -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_tokens(TokenPair::new(access, refresh)))
}

fn recipe(id: &str) -> Value {
    json!({
        "id": id,
        "title": "Pancakes",
        "difficulty": "EASY",
        "ingredients": ["flour", "milk", "eggs"],
        "instructions": ["mix", "fry"],
        "createdAt": "2024-03-01T08:00:00Z"
    })
}

fn ok_data(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

fn unauthorized() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({ "error": "Token expired" }))
}

fn refreshed(access: &str, refresh: &str) -> ResponseTemplate {
    ok_data(json!({ "tokens": { "accessToken": access, "refreshToken": refresh } }))
}

async fn mount_refresh(server: &MockServer, old_refresh: &str, response: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({ "refreshToken": old_refresh })))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Happy path
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_attaches_current_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ok_data(recipe("r1")))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", refreshed("A2", "R2"), 0).await;

    let client = client_with(&server, logged_in("A1", "R1"));
    let fetched = client.recipes().get("r1").await.unwrap();

    assert_eq!(fetched.id, "r1");
    assert_eq!(client.status().await, SessionStatus::Authenticated);
    server.verify().await;
}

#[tokio::test]
async fn test_anonymous_request_is_sent_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes"))
        .respond_with(ok_data(json!({ "items": [], "pagination": { "page": 1, "limit": 12, "total": 0, "totalPages": 0 } })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, Arc::new(MemoryTokenStore::new()));
    let page = client.recipes().list(&RecipeQuery::default()).await.unwrap();
    assert!(page.items.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_list_sends_filters_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes"))
        .and(query_param("difficulty", "HARD"))
        .and(query_param("sortBy", "createdAt"))
        .and(query_param("sortOrder", "desc"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "12"))
        .respond_with(ok_data(json!({ "items": [recipe("r9")] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, logged_in("A1", "R1"));
    let query = RecipeQuery::default().with_page(3).with_filters(larder_client::RecipeFilters {
        difficulty: Some(larder_client::Difficulty::Hard),
        ..Default::default()
    });
    let page = client.recipes().list(&query).await.unwrap();

    assert_eq!(page.items.len(), 1);
    server.verify().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh and retry
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refreshes_once_and_retries_with_new_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ok_data(recipe("r1")))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", refreshed("A2", "R2"), 1).await;

    let store = logged_in("A1", "R1");
    let client = client_with(&server, store.clone());
    let mut events = client.subscribe();

    let fetched = client.recipes().get("r1").await.unwrap();

    assert_eq!(fetched.title, "Pancakes");
    assert_eq!(
        store.credentials().await.pair(),
        Some(TokenPair::new("A2", "R2"))
    );
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Refreshed);
    server.verify().await;
}

#[tokio::test]
async fn test_refresh_call_carries_no_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ok_data(json!({ "id": "u1", "email": "cook@example.com" })))
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", refreshed("A2", "R2"), 1).await;

    let client = client_with(&server, logged_in("A1", "R1"));
    client.auth().profile().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let refresh = requests
        .iter()
        .find(|r| r.url.path() == "/api/auth/refresh")
        .unwrap();
    assert!(refresh.headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_second_rejection_is_returned_without_another_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", refreshed("A2", "R2"), 1).await;
    mount_refresh(&server, "R2", refreshed("A3", "R3"), 0).await;

    let store = logged_in("A1", "R1");
    let client = client_with(&server, store.clone());

    let err = client.recipes().get("r1").await.unwrap_err();

    assert!(matches!(err, Error::Auth(ref message) if message == "Token expired"));
    assert_eq!(
        store.credentials().await.pair(),
        Some(TokenPair::new("A2", "R2"))
    );
    server.verify().await;
}

#[tokio::test]
async fn test_retried_request_keeps_method_body_and_query() {
    let server = MockServer::start().await;
    let body = json!({ "rating": 4, "notes": "extra garlic" });
    Mock::given(method("POST"))
        .and(path("/api/recipes/r1/cook"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/recipes/r1/cook"))
        .and(header("authorization", "Bearer A2"))
        .and(body_json(body.clone()))
        .respond_with(ok_data(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", refreshed("A2", "R2"), 1).await;

    let client = client_with(&server, logged_in("A1", "R1"));
    let cook = larder_client::CookRequest::new(4, Some("extra garlic".to_string())).unwrap();
    client.recipes().cook("r1", &cook).await.unwrap();

    server.verify().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Terminal failures
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_refresh_token_ends_session_without_refresh_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed("A2", "R2"))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_credentials(Credentials {
        access_token: Some("A1".to_string()),
        refresh_token: None,
    }));
    let client = client_with(&server, store.clone());
    let mut events = client.subscribe();

    let err = client.recipes().get("r1").await.unwrap_err();

    assert!(matches!(
        err,
        Error::SessionExpired(ExpiryReason::MissingRefreshToken)
    ));
    assert!(store.credentials().await.is_empty());
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Expired {
            reason: ExpiryReason::MissingRefreshToken
        }
    );
    server.verify().await;
}

#[tokio::test]
async fn test_rejected_refresh_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        "R1",
        ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid refresh token" })),
        1,
    )
    .await;

    let store = logged_in("A1", "R1");
    let client = client_with(&server, store.clone());
    let mut events = client.subscribe();

    let err = client.dashboard().overview("u1").await.unwrap_err();

    assert!(err.is_session_expired());
    assert!(matches!(
        err,
        Error::SessionExpired(ExpiryReason::RefreshRejected { status: 401 })
    ));
    assert_eq!(client.status().await, SessionStatus::Anonymous);
    assert!(store.credentials().await.is_empty());
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::Expired { .. }
    ));
    server.verify().await;
}

#[tokio::test]
async fn test_expiry_clears_memory_even_when_session_file_is_stuck() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", ResponseTemplate::new(401), 1).await;

    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::in_dir(temp.path()));
    store.set_session(TokenPair::new("A1", "R1")).await.unwrap();

    // A non-empty directory where the session file was cannot be removed.
    std::fs::remove_file(store.path()).unwrap();
    std::fs::create_dir(store.path()).unwrap();
    std::fs::write(store.path().join("keep"), "x").unwrap();

    let client = client_with(&server, store.clone());
    let mut events = client.subscribe();

    let err = client.auth().profile().await.unwrap_err();

    assert!(matches!(
        err,
        Error::SessionExpired(ExpiryReason::RefreshRejected { status: 401 })
    ));
    assert_eq!(client.status().await, SessionStatus::Anonymous);
    assert_eq!(store.access_token().await, None);
    assert_eq!(store.refresh_token().await, None);
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Expired {
            reason: ExpiryReason::RefreshRejected { status: 401 }
        }
    );
    server.verify().await;
}

#[tokio::test]
async fn test_refresh_token_alone_does_not_trigger_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/saved"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", refreshed("A2", "R2"), 0).await;

    let store = Arc::new(MemoryTokenStore::with_credentials(Credentials {
        access_token: None,
        refresh_token: Some("R1".into()),
    }));
    let client = client_with(&server, store.clone());
    let mut events = client.subscribe();

    let response = client
        .send(ApiRequest::get("recipes/saved"))
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(store.refresh_token().await.as_deref(), Some("R1"));
    assert!(events.try_recv().is_err());
    server.verify().await;
}

#[tokio::test]
async fn test_malformed_refresh_body_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", ok_data(json!({ "user": {} })), 1).await;

    let store = logged_in("A1", "R1");
    let client = client_with(&server, store.clone());

    let err = client.recipes().get("r1").await.unwrap_err();

    assert!(matches!(
        err,
        Error::SessionExpired(ExpiryReason::RefreshFailed { .. })
    ));
    assert!(store.credentials().await.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Pass-through
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_other_error_statuses_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Recipe not found" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", refreshed("A2", "R2"), 0).await;

    let store = logged_in("A1", "R1");
    let client = client_with(&server, store.clone());

    let err = client.recipes().get("r1").await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, ref message } if message == "boom"));

    let err = client.recipes().get("missing").await.unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(
        store.credentials().await.pair(),
        Some(TokenPair::new("A1", "R1"))
    );
    server.verify().await;
}

#[tokio::test]
async fn test_failed_login_is_not_a_session_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid credentials" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed("A2", "R2"))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_with(&server, Arc::new(MemoryTokenStore::new()));
    let mut events = client.subscribe();

    let err = client
        .auth()
        .login(LoginRequest::new("cook@example.com", "wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(ref message) if message == "Invalid credentials"));
    assert!(events.try_recv().is_err());
    server.verify().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency and cancellation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_rejections_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ok_data(recipe("r1")))
        .expect(8)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        "R1",
        refreshed("A2", "R2").set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let client = client_with(&server, logged_in("A1", "R1"));
    let calls = (0..8).map(|_| {
        let client = client.clone();
        async move { client.recipes().get("r1").await }
    });

    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()));
    server.verify().await;
}

#[tokio::test]
async fn test_concurrent_terminal_failure_emits_one_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        "R1",
        ResponseTemplate::new(401).set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let client = client_with(&server, logged_in("A1", "R1"));
    let mut events = client.subscribe();
    let calls = (0..4).map(|_| {
        let client = client.clone();
        async move { client.recipes().get("r1").await }
    });

    let results = futures::future::join_all(calls).await;

    assert!(results
        .iter()
        .all(|r| matches!(r, Err(Error::SessionExpired(_)))));
    assert!(matches!(events.try_recv().unwrap(), SessionEvent::Expired { .. }));
    assert!(events.try_recv().is_err());
    server.verify().await;
}

#[tokio::test]
async fn test_cancellation_leaves_store_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refreshed("A2", "R2").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let store = logged_in("A1", "R1");
    let client = client_with(&server, store.clone());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = client
        .send_cancellable(larder_client::ApiRequest::get("recipes/r1"), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(
        store.credentials().await.pair(),
        Some(TokenPair::new("A1", "R1"))
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ─────────────────────────────────────────────────────────────────────────────

fn auth_payload(access: &str, refresh: &str) -> Value {
    json!({
        "user": { "id": 1, "email": "cook@example.com", "firstName": "Ada", "lastName": "Lovelace" },
        "tokens": { "accessToken": access, "refreshToken": refresh }
    })
}

#[tokio::test]
async fn test_login_establishes_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": "cook@example.com", "password": "hunter22" })))
        .respond_with(ok_data(auth_payload("A1", "R1")))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let client = client_with(&server, store.clone());
    let mut events = client.subscribe();

    let user = client
        .auth()
        .login(LoginRequest::new("cook@example.com", "hunter22"))
        .await
        .unwrap();

    assert_eq!(user.id, "1");
    assert_eq!(user.display_name(), "Ada Lovelace");
    assert_eq!(client.status().await, SessionStatus::Authenticated);
    assert_eq!(store.access_token().await.as_deref(), Some("A1"));
    assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedIn);
}

#[tokio::test]
async fn test_logout_clears_session_even_if_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in("A1", "R1");
    let client = client_with(&server, store.clone());
    let mut events = client.subscribe();

    client.auth().logout().await.unwrap();

    assert_eq!(client.status().await, SessionStatus::Anonymous);
    assert!(store.credentials().await.is_empty());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedOut);
}

#[tokio::test]
async fn test_check_restores_valid_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ok_data(json!({ "id": "u1", "email": "cook@example.com" })))
        .mount(&server)
        .await;

    let client = client_with(&server, logged_in("A1", "R1"));
    let user = client.auth().check().await.unwrap();

    assert_eq!(user.unwrap().id, "u1");
}

#[tokio::test]
async fn test_check_without_session_makes_no_calls() {
    let server = MockServer::start().await;

    let client = client_with(&server, Arc::new(MemoryTokenStore::new()));
    assert!(client.auth().check().await.unwrap().is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_check_drops_stale_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", ResponseTemplate::new(403), 1).await;

    let store = logged_in("A1", "R1");
    let client = client_with(&server, store.clone());

    assert!(client.auth().check().await.unwrap().is_none());
    assert!(store.credentials().await.is_empty());
}

#[tokio::test]
async fn test_check_rejected_after_refresh_reports_logout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(unauthorized())
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", refreshed("A2", "R2"), 1).await;

    let store = logged_in("A1", "R1");
    let client = client_with(&server, store.clone());
    let mut events = client.subscribe();

    assert!(client.auth().check().await.unwrap().is_none());
    assert!(store.credentials().await.is_empty());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Refreshed);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedOut);
    server.verify().await;
}

#[tokio::test]
async fn test_refreshed_tokens_are_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/r1"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ok_data(recipe("r1")))
        .mount(&server)
        .await;
    mount_refresh(&server, "R1", refreshed("A2", "R2"), 1).await;

    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::in_dir(temp.path()));
    store.set_session(TokenPair::new("A1", "R1")).await.unwrap();

    let client = client_with(&server, store);
    client.recipes().get("r1").await.unwrap();

    let reopened = FileTokenStore::in_dir(temp.path());
    assert_eq!(
        reopened.credentials().await.pair(),
        Some(TokenPair::new("A2", "R2"))
    );
}
