use link_core::authenticator::{ApiRequest, RequestAuthenticator};
use link_core::config::ServerConfig;
use link_core::connection::TokenFactory;
use link_core::credentials::{CredentialPair, CredentialStore, MemoryCredentialStore};
use link_core::error::AuthError;
use link_core::events::{LifecycleBus, LifecycleEvent};

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Public API tests for RequestAuthenticator against a mock backend
// ============================================================================

struct Fixture {
    server: MockServer,
    store: Arc<MemoryCredentialStore>,
    authenticator: RequestAuthenticator,
    events: broadcast::Receiver<LifecycleEvent>,
}

fn pair(access: &str, refresh: &str) -> CredentialPair {
    CredentialPair::new(access, refresh).expect("valid pair")
}

async fn fixture(initial: Option<CredentialPair>) -> Fixture {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new(initial));
    let bus = LifecycleBus::new(16);
    let events = bus.subscribe();
    let config = ServerConfig {
        base_url: server.uri(),
        ..ServerConfig::default()
    };
    let authenticator =
        RequestAuthenticator::new(&config, store.clone(), bus).expect("authenticator");

    Fixture {
        server,
        store,
        authenticator,
        events,
    }
}

fn session_invalidations(events: &mut broadcast::Receiver<LifecycleEvent>) -> usize {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        if event == LifecycleEvent::SessionInvalid {
            count += 1;
        }
    }
    count
}

async fn mount(server: &MockServer, path_str: &str, bearer: &str, response: ResponseTemplate, times: u64) {
    Mock::given(method("GET"))
        .and(path(path_str))
        .and(header("authorization", format!("Bearer {bearer}").as_str()))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

// ----------------------------------------------------------------------------
// send() - single exchange-and-retry
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies the expired-access-token path end to end.
///
/// **WHY THIS MATTERS**: This is the recovery every request relies on. The caller
/// must receive the retried response and the store must end up holding the new pair.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The exchange being sent with the access token instead of the refresh token
/// - The retry reusing the old access token
/// - More than one retry or more than one exchange
#[tokio::test]
async fn given_expired_access_token_when_sending_then_exchanges_once_and_retries_with_new_token() {
    // GIVEN: The backend rejects a1, exchanges r1 for {a2,r2} and accepts a2
    let mut f = fixture(Some(pair("a1", "r1"))).await;
    mount(&f.server, "/api/items", "a1", ResponseTemplate::new(401), 1).await;
    mount(
        &f.server,
        "/api/exchangeToken",
        "r1",
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "a2", "refresh_token": "r2"})),
        1,
    )
    .await;
    mount(
        &f.server,
        "/api/items",
        "a2",
        ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2, 3]})),
        1,
    )
    .await;

    // WHEN: Sending the request
    let response = f
        .authenticator
        .send(ApiRequest::get("api/items"))
        .await
        .expect("retried request should succeed");

    // THEN: The caller gets the retried response and the store holds {a2,r2}
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body, json!({"items": [1, 2, 3]}));
    assert_eq!(f.store.get(), Some(pair("a2", "r2")));
    assert_eq!(session_invalidations(&mut f.events), 0);
}

/// **VALUE**: Verifies a rejected refresh token ends the session after one exchange.
///
/// **BUG THIS CATCHES**: Would catch retrying the exchange itself, retrying the
/// original request without fresh credentials, or failing silently.
#[tokio::test]
async fn given_rejected_refresh_token_when_sending_then_fails_once_and_invalidates_session() {
    // GIVEN: Both the request and the exchange are rejected
    let mut f = fixture(Some(pair("a1", "r1"))).await;
    mount(&f.server, "/api/items", "a1", ResponseTemplate::new(401), 1).await;
    mount(&f.server, "/api/exchangeToken", "r1", ResponseTemplate::new(401), 1).await;

    // WHEN: Sending the request
    let result = f.authenticator.send(ApiRequest::get("/api/items")).await;

    // THEN: Exactly one failure, one SessionInvalid, the store untouched
    let err = result.expect_err("should fail");
    assert!(matches!(err, AuthError::ExchangeFailed { .. }), "got {err}");
    assert!(err.invalidates_session());
    assert_eq!(session_invalidations(&mut f.events), 1);
    assert_eq!(f.store.get(), Some(pair("a1", "r1")));
}

/// **VALUE**: Verifies a transient exchange failure does not log the user out.
///
/// **WHY THIS MATTERS**: Only a rejected refresh token means the session is over.
/// A 503 from the exchange endpoint must surface the same way it would through
/// `refresh_credentials`, so the stream path and the request path agree.
///
/// **BUG THIS CATCHES**: Would catch every exchange failure being treated as a
/// session invalidation, which ends the monitor on a server hiccup.
#[tokio::test]
async fn given_exchange_unavailable_when_recovering_from_401_then_error_without_invalidation() {
    // GIVEN: The request is rejected and the exchange endpoint is down
    let mut f = fixture(Some(pair("a1", "r1"))).await;
    mount(&f.server, "/api/items", "a1", ResponseTemplate::new(401), 1).await;
    mount(
        &f.server,
        "/api/exchangeToken",
        "r1",
        ResponseTemplate::new(503).set_body_string("maintenance"),
        1,
    )
    .await;

    // WHEN: Sending the request
    let err = f
        .authenticator
        .send(ApiRequest::get("/api/items"))
        .await
        .expect_err("should fail");

    // THEN: The 503 comes back as an HTTP error and the session survives
    assert!(matches!(err, AuthError::Http { .. }), "got {err}");
    assert_eq!(err.status_code(), Some(503));
    assert!(!err.invalidates_session());
    assert_eq!(session_invalidations(&mut f.events), 0);
    assert_eq!(f.store.get(), Some(pair("a1", "r1")));
}

#[tokio::test]
async fn given_retry_also_unauthorized_when_sending_then_no_second_exchange() {
    let mut f = fixture(Some(pair("a1", "r1"))).await;
    mount(&f.server, "/api/items", "a1", ResponseTemplate::new(401), 1).await;
    mount(
        &f.server,
        "/api/exchangeToken",
        "r1",
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "a2", "refresh_token": "r2"})),
        1,
    )
    .await;
    mount(&f.server, "/api/items", "a2", ResponseTemplate::new(401), 1).await;

    let err = f
        .authenticator
        .send(ApiRequest::get("api/items"))
        .await
        .expect_err("should fail");

    assert!(matches!(err, AuthError::Unauthorized { .. }), "got {err}");
    assert_eq!(session_invalidations(&mut f.events), 1);
    assert_eq!(f.store.get(), Some(pair("a2", "r2")));
}

/// **VALUE**: Verifies the exchange endpoint authenticates with the refresh token.
///
/// **BUG THIS CATCHES**: Would catch the self-reference guard missing, which would
/// send the (expired) access token to the exchange endpoint and never recover.
#[tokio::test]
async fn given_exchange_path_when_sending_then_refresh_token_is_used_and_pair_captured() {
    // GIVEN: The exchange endpoint only accepts r1
    let f = fixture(Some(pair("a1", "r1"))).await;
    mount(
        &f.server,
        "/api/exchangeToken",
        "r1",
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "a2", "refresh_token": "r2"})),
        1,
    )
    .await;

    // WHEN: Calling it directly
    f.authenticator
        .send(ApiRequest::get("api/exchangeToken"))
        .await
        .expect("exchange should succeed");

    // THEN: The returned pair was captured
    assert_eq!(f.store.get(), Some(pair("a2", "r2")));
}

#[tokio::test]
async fn given_exchange_path_rejected_when_sending_then_no_recursive_exchange() {
    let mut f = fixture(Some(pair("a1", "r1"))).await;
    mount(&f.server, "/api/exchangeToken", "r1", ResponseTemplate::new(401), 1).await;

    let err = f
        .authenticator
        .send(ApiRequest::get("api/exchangeToken"))
        .await
        .expect_err("should fail");

    assert!(matches!(err, AuthError::ExchangeFailed { .. }), "got {err}");
    assert_eq!(session_invalidations(&mut f.events), 1);
}

/// **VALUE**: Verifies non-401 failures pass straight through.
///
/// **WHY THIS MATTERS**: A 500 or 404 says nothing about the credentials; exchanging
/// or logging the user out on it would be wrong.
#[tokio::test]
async fn given_server_error_when_sending_then_http_error_without_exchange() {
    // GIVEN: The backend fails with 500 and the exchange must not be called
    let mut f = fixture(Some(pair("a1", "r1"))).await;
    mount(
        &f.server,
        "/api/items",
        "a1",
        ResponseTemplate::new(500).set_body_string("boom"),
        1,
    )
    .await;
    mount(&f.server, "/api/exchangeToken", "r1", ResponseTemplate::new(200), 0).await;

    // WHEN: Sending
    let err = f
        .authenticator
        .send(ApiRequest::get("api/items"))
        .await
        .expect_err("should fail");

    // THEN: HTTP error carrying the status, session intact
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(err.error_category(), "server_error");
    assert!(!err.invalidates_session());
    assert_eq!(session_invalidations(&mut f.events), 0);
}

#[tokio::test]
async fn given_no_credentials_when_unauthorized_then_session_invalid() {
    let mut f = fixture(None).await;
    Mock::given(method("GET"))
        .and(path("/api/items"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&f.server)
        .await;

    let err = f
        .authenticator
        .send(ApiRequest::get("api/items"))
        .await
        .expect_err("should fail");

    assert!(matches!(err, AuthError::Unauthorized { .. }), "got {err}");
    assert_eq!(session_invalidations(&mut f.events), 1);
    let requests = f.server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

/// **VALUE**: Verifies JSON bodies, extra headers and credential capture on login-style
/// responses.
#[tokio::test]
async fn given_post_with_body_when_response_carries_pair_then_store_updated() {
    // GIVEN: A login endpoint that returns a pair
    let f = fixture(None).await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(header("content-type", "application/json"))
        .and(header("x-client", "link-tests"))
        .and(body_json(json!({"user": "ada"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "a1", "refresh_token": "r1", "user": "ada"})),
        )
        .expect(1)
        .mount(&f.server)
        .await;

    // WHEN: Posting
    let response = f
        .authenticator
        .send(
            ApiRequest::post("api/login")
                .with_json(json!({"user": "ada"}))
                .with_header("x-client", "link-tests"),
        )
        .await
        .expect("login should succeed");

    // THEN: The response is returned unchanged and the pair stored
    assert!(response.status().is_success());
    assert!(response.text().contains("\"user\":\"ada\""));
    assert_eq!(f.store.get(), Some(pair("a1", "r1")));
}

// ----------------------------------------------------------------------------
// refresh_credentials() / TokenFactory
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies the authenticator works as the connection manager's token factory.
#[tokio::test]
async fn given_stored_pair_when_fetching_through_token_factory_then_returns_exchanged_pair() {
    // GIVEN: An exchange endpoint issuing {a2,r2}
    let f = fixture(Some(pair("a1", "r1"))).await;
    mount(
        &f.server,
        "/api/exchangeToken",
        "r1",
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "a2", "refresh_token": "r2"})),
        1,
    )
    .await;

    // WHEN: Fetching via the TokenFactory trait
    let fetched = f.authenticator.fetch().await.expect("fetch should succeed");

    // THEN: The new pair is returned and stored
    assert_eq!(fetched, pair("a2", "r2"));
    assert_eq!(f.store.get(), Some(pair("a2", "r2")));
}

#[tokio::test]
async fn given_malformed_exchange_response_when_refreshing_then_session_invalid() {
    let mut f = fixture(Some(pair("a1", "r1"))).await;
    mount(
        &f.server,
        "/api/exchangeToken",
        "r1",
        ResponseTemplate::new(200).set_body_json(json!({"access_token": "a2"})),
        1,
    )
    .await;

    let err = f
        .authenticator
        .refresh_credentials()
        .await
        .expect_err("should fail");

    assert!(matches!(err, AuthError::MalformedExchange { .. }), "got {err}");
    assert_eq!(session_invalidations(&mut f.events), 1);
    assert_eq!(f.store.get(), Some(pair("a1", "r1")));
}

#[tokio::test]
async fn given_empty_store_when_refreshing_then_no_credentials_without_network() {
    let mut f = fixture(None).await;

    let err = f
        .authenticator
        .refresh_credentials()
        .await
        .expect_err("should fail");

    assert!(matches!(err, AuthError::NoCredentials { .. }), "got {err}");
    assert_eq!(session_invalidations(&mut f.events), 1);
    assert!(f.server.received_requests().await.unwrap().is_empty());
}
