//! Integration tests for the authenticated request pipeline

use fitmarket_http::{
    ACCESS_TOKEN_KEY, ApiClient, ClientError, CountingIndicator, LogoutReason, MemoryStore,
    Navigator, REFRESH_TOKEN_KEY, RefreshError, RequestOptions, SessionEvent, SessionStore,
};
use futures::future::join_all;
use reqwest::Method;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFRESH_PATH: &str = "/api/token/refresh/";

#[derive(Default)]
struct RecordingNavigator {
    on_login: AtomicBool,
    redirects: AtomicUsize,
}

impl RecordingNavigator {
    fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn is_on_login_view(&self) -> bool {
        self.on_login.load(Ordering::SeqCst)
    }

    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    client: ApiClient,
    store: Arc<MemoryStore>,
    indicator: Arc<CountingIndicator>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(server: &MockServer, access: Option<&str>, refresh: Option<&str>) -> Harness {
    let store = Arc::new(MemoryStore::with_tokens(access, refresh));
    let indicator = Arc::new(CountingIndicator::new());
    let navigator = Arc::new(RecordingNavigator::default());

    let client = ApiClient::builder()
        .base_url(server.uri())
        .timeout(Duration::from_secs(5))
        .session_store(store.clone())
        .loading_indicator(indicator.clone())
        .navigator(navigator.clone())
        .build()
        .unwrap();

    Harness {
        client,
        store,
        indicator,
        navigator,
    }
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

fn logouts(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::LoggedOut { .. }))
        .count()
}

async fn mount_protected(server: &MockServer, route: &str, token: &str, status: u16, body: Value) {
    Mock::given(path(route))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, refresh: &str, access: &str, delay: Duration, calls: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({"refresh": refresh, "refresh_token": refresh})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": access}))
                .set_delay(delay),
        )
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_valid_token_passes_response_through() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    mount_protected(&server, "/api/courses/", "t1", 200, json!([{"id": 7, "title": "HIIT"}])).await;
    Mock::given(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let response = h
        .client
        .send(h.client.request(Method::GET, "/api/courses/"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!([{"id": 7, "title": "HIIT"}]));

    assert_eq!(h.indicator.show_count(), 1);
    assert_eq!(h.indicator.hide_count(), 1);
    assert!(!h.indicator.is_loading());
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("expired"), Some("r1"));
    let mut events = h.client.session().subscribe();

    mount_protected(&server, "/api/profile/", "expired", 401, json!({"detail": "expired"})).await;
    mount_protected(&server, "/api/profile/", "t2", 200, json!({"name": "Dana"})).await;
    mount_refresh(&server, "r1", "t2", Duration::ZERO, 1).await;

    let profile: Value = h.client.get_json("/api/profile/").await.unwrap();

    assert_eq!(profile, json!({"name": "Dana"}));
    assert_eq!(h.store.get(ACCESS_TOKEN_KEY).as_deref(), Some("t2"));
    assert_eq!(h.store.get(REFRESH_TOKEN_KEY).as_deref(), Some("r1"));
    assert_eq!(drain(&mut events), vec![SessionEvent::TokenRefreshed]);

    // One logical request, one indicator pair, even with the replay
    assert_eq!(h.indicator.show_count(), 1);
    assert_eq!(h.indicator.hide_count(), 1);
}

#[tokio::test]
async fn test_replay_preserves_method_and_body() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("expired"), Some("r1"));
    let order = json!({"course_id": 7, "quantity": 1});

    Mock::given(method("POST"))
        .and(path("/api/orders/"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/orders/"))
        .and(header("authorization", "Bearer t2"))
        .and(body_json(order.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 99})))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "r1", "t2", Duration::ZERO, 1).await;

    let created: Value = h.client.post_json("/api/orders/", &order).await.unwrap();
    assert_eq!(created, json!({"id": 99}));
}

#[tokio::test]
async fn test_second_401_is_returned_not_retried_again() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    Mock::given(path("/api/payments/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("still unauthorized"))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, "r1", "t2", Duration::ZERO, 1).await;

    let result = h
        .client
        .send(h.client.request(Method::GET, "/api/payments/"))
        .await;

    match result {
        Err(ClientError::AuthenticationFailed(message)) => {
            assert_eq!(message, "still unauthorized");
        }
        other => panic!("expected the second 401, got {other:?}"),
    }
    assert_eq!(h.indicator.show_count(), h.indicator.hide_count());
}

#[tokio::test]
async fn test_concurrent_401s_share_a_single_refresh() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    for route in ["/api/trainers/", "/api/stores/"] {
        mount_protected(&server, route, "t1", 401, json!({"detail": "expired"})).await;
        mount_protected(&server, route, "t2", 200, json!({"route": route})).await;
    }
    mount_refresh(&server, "r1", "t2", Duration::from_millis(300), 1).await;

    let (trainers, stores) = tokio::join!(
        h.client.get_json::<Value>("/api/trainers/"),
        h.client.get_json::<Value>("/api/stores/"),
    );

    assert_eq!(trainers.unwrap(), json!({"route": "/api/trainers/"}));
    assert_eq!(stores.unwrap(), json!({"route": "/api/stores/"}));
    assert!(!h.client.refresh_coordinator().is_refreshing());
}

#[tokio::test]
async fn test_many_concurrent_401s_all_retry_with_same_token() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    mount_protected(&server, "/api/feed/", "t1", 401, json!({})).await;
    Mock::given(path("/api/feed/"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"posts": []})))
        .expect(6)
        .mount(&server)
        .await;
    mount_refresh(&server, "r1", "t2", Duration::from_millis(300), 1).await;

    let results = join_all((0..6).map(|_| h.client.get_json::<Value>("/api/feed/"))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(h.indicator.show_count(), 6);
    assert_eq!(h.indicator.hide_count(), 6);
}

#[tokio::test]
async fn test_refresh_failure_rejects_all_and_logs_out_once() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));
    h.store.set("meal_history", "[]").unwrap();
    let mut events = h.client.session().subscribe();

    Mock::given(path("/api/bookings/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("token_not_valid")
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let results = join_all(
        (0..3).map(|_| h.client.send(h.client.request(Method::GET, "/api/bookings/"))),
    )
    .await;

    for result in results {
        match result {
            Err(ClientError::Refresh(RefreshError::Rejected { status, message })) => {
                assert_eq!(status, 401);
                assert_eq!(message, "token_not_valid");
            }
            other => panic!("expected refresh rejection, got {other:?}"),
        }
    }

    let events = drain(&mut events);
    assert_eq!(logouts(&events), 1);
    assert!(events.contains(&SessionEvent::LoggedOut {
        reason: LogoutReason::RefreshFailed
    }));
    assert_eq!(h.navigator.redirects(), 1);
    assert!(h.store.is_empty());
    assert!(!h.indicator.is_loading());
}

#[tokio::test]
async fn test_missing_refresh_token_logs_out_without_network_call() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), None);
    let mut events = h.client.session().subscribe();

    Mock::given(path("/api/courses/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "t2"})))
        .expect(0)
        .mount(&server)
        .await;

    let result = h
        .client
        .send(h.client.request(Method::GET, "/api/courses/"))
        .await;

    assert!(matches!(
        result,
        Err(ClientError::Refresh(RefreshError::MissingRefreshToken))
    ));
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoggedOut {
            reason: LogoutReason::MissingRefreshToken
        }]
    );
    assert_eq!(h.navigator.redirects(), 1);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_forced_logout_skips_redirect_on_login_view() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), None);
    h.navigator.on_login.store(true, Ordering::SeqCst);

    Mock::given(path("/api/me/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = h.client.get_json::<Value>("/api/me/").await;

    assert!(result.is_err());
    assert_eq!(h.navigator.redirects(), 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_other_statuses_propagate_without_refresh() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    Mock::given(path("/api/stores/42/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such store"))
        .mount(&server)
        .await;
    Mock::given(path("/api/checkout/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "t2"})))
        .expect(0)
        .mount(&server)
        .await;

    let missing = h.client.get_json::<Value>("/api/stores/42/").await;
    assert!(matches!(missing, Err(ClientError::NotFound(ref m)) if m == "no such store"));

    let unavailable = h.client.get_json::<Value>("/api/checkout/").await;
    assert!(matches!(
        unavailable,
        Err(ClientError::ServerError { status: 503, .. })
    ));

    assert_eq!(h.store.get(ACCESS_TOKEN_KEY).as_deref(), Some("t1"));
    assert_eq!(h.indicator.show_count(), 2);
    assert_eq!(h.indicator.hide_count(), 2);
}

#[tokio::test]
async fn test_network_error_is_not_retried() {
    // Grab a free port, then close it so nothing is listening
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let indicator = Arc::new(CountingIndicator::new());
    let client = ApiClient::builder()
        .base_url(format!("http://{addr}"))
        .session_store(Arc::new(MemoryStore::with_tokens(Some("t1"), Some("r1"))))
        .loading_indicator(indicator.clone())
        .build()
        .unwrap();

    let result = client.send(client.request(Method::GET, "/api/feed/")).await;

    let err = result.unwrap_err();
    assert!(err.is_network(), "expected network error, got {err:?}");
    assert!(!client.refresh_coordinator().is_refreshing());
    assert_eq!(client.session().refresh_token().as_deref(), Some("r1"));
    assert_eq!(indicator.show_count(), 1);
    assert_eq!(indicator.hide_count(), 1);
}

#[tokio::test]
async fn test_timeout_is_a_network_error() {
    let server = MockServer::start().await;
    let client = ApiClient::builder()
        .base_url(server.uri())
        .timeout(Duration::from_millis(200))
        .session_store(Arc::new(MemoryStore::with_tokens(Some("t1"), Some("r1"))))
        .build()
        .unwrap();

    Mock::given(path("/api/slow/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    Mock::given(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "t2"})))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.send(client.request(Method::GET, "/api/slow/")).await;

    match result {
        Err(ClientError::Request(err)) => assert!(err.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_suppressed_requests_never_touch_indicator() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    mount_protected(&server, "/api/notifications/", "t1", 200, json!([])).await;
    Mock::given(path("/api/unread/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_protected(&server, "/api/poll/", "t1", 401, json!({})).await;
    mount_protected(&server, "/api/poll/", "t2", 200, json!({"new": 0})).await;
    mount_refresh(&server, "r1", "t2", Duration::ZERO, 1).await;

    let background = RequestOptions::background();

    h.client
        .send_with(h.client.request(Method::GET, "/api/notifications/"), background)
        .await
        .unwrap();
    h.client
        .send_with(h.client.request(Method::GET, "/api/unread/"), background)
        .await
        .unwrap_err();
    let polled: Value = h
        .client
        .execute_with(h.client.request(Method::GET, "/api/poll/"), background)
        .await
        .unwrap();

    assert_eq!(polled, json!({"new": 0}));
    assert_eq!(h.indicator.show_count(), 0);
    assert_eq!(h.indicator.hide_count(), 0);
}

#[tokio::test]
async fn test_suppressed_refresh_failure_still_logs_out() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    Mock::given(path("/api/poll/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let result = h
        .client
        .send_with(
            h.client.request(Method::GET, "/api/poll/"),
            RequestOptions::background(),
        )
        .await;

    assert!(result.unwrap_err().ends_session());
    assert_eq!(h.indicator.show_count(), 0);
    assert_eq!(h.navigator.redirects(), 1);
}

#[tokio::test]
async fn test_rotated_refresh_token_is_persisted() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    mount_protected(&server, "/api/me/", "t1", 401, json!({})).await;
    mount_protected(&server, "/api/me/", "t2", 200, json!({"id": 1})).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "t2", "refresh_token": "r2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    h.client.get_json::<Value>("/api/me/").await.unwrap();

    assert_eq!(h.store.get(ACCESS_TOKEN_KEY).as_deref(), Some("t2"));
    assert_eq!(h.store.get(REFRESH_TOKEN_KEY).as_deref(), Some("r2"));
}

#[tokio::test]
async fn test_refresh_without_access_token_is_invalid() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    mount_protected(&server, "/api/me/", "t1", 401, json!({})).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "ok"})))
        .mount(&server)
        .await;

    let result = h.client.get_json::<Value>("/api/me/").await;

    assert!(matches!(
        result,
        Err(ClientError::Refresh(RefreshError::InvalidResponse(_)))
    ));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_login_stores_tokens_and_bypasses_refresh() {
    let server = MockServer::start().await;
    let h = harness(&server, None, None);
    let mut events = h.client.session().subscribe();

    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .and(body_json(json!({"username": "coach", "password": "pw"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": "t1", "refresh": "r1"})),
        )
        .mount(&server)
        .await;

    h.client.login("coach", "pw").await.unwrap();

    assert_eq!(h.store.get(ACCESS_TOKEN_KEY).as_deref(), Some("t1"));
    assert_eq!(h.store.get(REFRESH_TOKEN_KEY).as_deref(), Some("r1"));
    assert_eq!(drain(&mut events), vec![SessionEvent::LoggedIn]);
    assert_eq!(h.indicator.show_count(), 1);
    assert_eq!(h.indicator.hide_count(), 1);
}

#[tokio::test]
async fn test_login_with_bad_credentials_does_not_refresh() {
    let server = MockServer::start().await;
    let h = harness(&server, None, Some("stale"));

    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;
    Mock::given(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = h.client.login("coach", "wrong").await;

    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    assert_eq!(h.navigator.redirects(), 0);
}

#[tokio::test]
async fn test_explicit_logout_clears_session() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));
    let mut events = h.client.session().subscribe();

    h.client.logout();

    assert!(h.store.is_empty());
    assert!(!h.client.session().is_authenticated());
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoggedOut {
            reason: LogoutReason::UserRequested
        }]
    );
    assert_eq!(h.navigator.redirects(), 1);
}

#[tokio::test]
async fn test_requests_without_token_are_sent_bare() {
    let server = MockServer::start().await;
    let h = harness(&server, None, None);

    Mock::given(path("/api/public/courses/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    h.client
        .get_json::<Value>("/api/public/courses/")
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(!received[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_timed_out_caller_does_not_cancel_shared_refresh() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    for route in ["/api/cart/", "/api/wishlist/"] {
        mount_protected(&server, route, "t1", 401, json!({})).await;
        mount_protected(&server, route, "t2", 200, json!({"route": route})).await;
    }
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({"refresh": "r1", "refresh_token": "r1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": "t2", "refresh": "r2"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let impatient = tokio::time::timeout(
        Duration::from_millis(100),
        h.client.get_json::<Value>("/api/cart/"),
    );
    let patient = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.client.get_json::<Value>("/api/wishlist/").await
    };

    let (impatient, patient) = tokio::join!(impatient, patient);

    assert!(impatient.is_err(), "first caller should have timed out");
    assert_eq!(patient.unwrap(), json!({"route": "/api/wishlist/"}));
    assert_eq!(h.store.get(ACCESS_TOKEN_KEY).as_deref(), Some("t2"));
    assert_eq!(h.store.get(REFRESH_TOKEN_KEY).as_deref(), Some("r2"));
    assert_eq!(h.navigator.redirects(), 0);
    assert_eq!(h.indicator.show_count(), h.indicator.hide_count());
}

#[tokio::test]
async fn test_undecodable_success_body_is_not_a_network_error() {
    let server = MockServer::start().await;
    let h = harness(&server, Some("t1"), Some("r1"));

    Mock::given(path("/api/courses/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = h
        .client
        .get_json::<Value>("/api/courses/")
        .await
        .unwrap_err();

    match &err {
        ClientError::Request(inner) => assert!(inner.is_decode()),
        other => panic!("expected decode failure, got {other:?}"),
    }
    assert!(!err.is_network());
    assert!(!err.ends_session());
}
