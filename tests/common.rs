#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use respect_client::{ApiClient, MemorySessionStore, Session, SessionManager, SharedLocation};
use respect_client::HttpAuthProvider;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("respect_client=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// The token the mock backend accepts before any refresh has happened.
pub const VALID_TOKEN: &str = "valid-token";
pub const STALE_TOKEN: &str = "stale-token";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
}

/// Shared state of the mock backend and mock auth service.
#[derive(Debug, Default)]
pub struct MockState {
    accepted_tokens: Mutex<HashSet<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    pub refresh_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    reject_refresh: bool,
    refresh_delay: Duration,
}

impl MockState {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn record(&self, path: &str, headers: &HeaderMap) -> Option<String> {
        let authorization = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string);
        let request_id = headers.get("x-request-id").and_then(|v| v.to_str().ok()).map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            path: path.to_string(),
            authorization: authorization.clone(),
            request_id,
        });
        authorization
    }

    fn is_authorized(&self, authorization: Option<&str>) -> bool {
        authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| self.accepted_tokens.lock().unwrap().contains(token))
    }
}

#[derive(Debug, Clone)]
pub struct TestOptions {
    pub session: Option<Session>,
    pub reject_refresh: bool,
    pub refresh_delay: Duration,
    pub single_flight: bool,
    pub debug: bool,
    pub current_path: String,
    pub timeout: Duration,
    /// Auth service base URL; defaults to the mock auth routes.
    pub auth_url: Option<String>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            session: Some(Session::expiring_in(VALID_TOKEN, "refresh-0", 3600)),
            reject_refresh: false,
            refresh_delay: Duration::ZERO,
            single_flight: true,
            debug: false,
            current_path: "/feed".to_string(),
            timeout: Duration::from_secs(5),
            auth_url: None,
        }
    }
}

impl TestOptions {
    pub fn stale_session() -> Self {
        Self { session: Some(Session::expiring_in(STALE_TOKEN, "refresh-0", -60)), ..Self::default() }
    }
}

/// An address nothing listens on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[derive(Debug)]
pub struct TestApp {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    pub sessions: Arc<SessionManager>,
    pub location: SharedLocation,
    pub client: ApiClient,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        setup_tracing();

        let state = Arc::new(MockState {
            accepted_tokens: Mutex::new(HashSet::from([VALID_TOKEN.to_string()])),
            reject_refresh: options.reject_refresh,
            refresh_delay: options.refresh_delay,
            ..MockState::default()
        });

        let router = Router::new()
            .route("/rest/users/me", get(me))
            .route("/rest/always-401", get(always_unauthorized))
            .route("/rest/status/{code}", get(status))
            .route("/rest/echo", get(echo).post(echo))
            .route("/rest/slow", get(slow))
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/logout", post(logout))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let http = reqwest::Client::builder().timeout(options.timeout).build().unwrap();
        let store = options.session.map_or_else(MemorySessionStore::new, MemorySessionStore::with_session);
        let auth_url = options.auth_url.unwrap_or_else(|| format!("http://{addr}/auth/v1"));
        let provider = HttpAuthProvider::new(http.clone(), &auth_url, Some("anon".into()));
        let sessions = Arc::new(
            SessionManager::new(Arc::new(store), Arc::new(provider)).with_single_flight(options.single_flight),
        );
        let location = SharedLocation::new(options.current_path);

        let client = ApiClient::builder(format!("http://{addr}/rest"), Arc::clone(&sessions))
            .http_client(http)
            .location(Arc::new(location.clone()))
            .login_path("/login")
            .debug(options.debug)
            .build()
            .unwrap();

        Self { addr, state, sessions, location, client }
    }
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let authorization = state.record("/rest/users/me", &headers);
    if state.is_authorized(authorization.as_deref()) {
        Json(json!({ "id": "user-1", "display_name": "Test Listener" })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "JWT expired" }))).into_response()
    }
}

async fn always_unauthorized(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/rest/always-401", &headers);
    (StatusCode::UNAUTHORIZED, "token revoked").into_response()
}

async fn status(State(state): State<Arc<MockState>>, Path(code): Path<u16>, headers: HeaderMap) -> Response {
    let path = format!("/rest/status/{code}");
    state.record(&path, &headers);
    let status = StatusCode::from_u16(code).unwrap();
    if status == StatusCode::NO_CONTENT {
        status.into_response()
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        (status, [(header::RETRY_AFTER, "3")], format!("status {code}")).into_response()
    } else {
        (status, format!("status {code}")).into_response()
    }
}

async fn echo(State(state): State<Arc<MockState>>, headers: HeaderMap, body: String) -> Response {
    let authorization = state.record("/rest/echo", &headers);
    let body: Value = if body.is_empty() { Value::Null } else { serde_json::from_str(&body).unwrap() };
    let custom = headers.get("x-custom").and_then(|v| v.to_str().ok());
    let request_id = headers.get("x-request-id").and_then(|v| v.to_str().ok());
    Json(json!({
        "authorization": authorization,
        "request_id": request_id,
        "custom": custom,
        "body": body,
    }))
    .into_response()
}

async fn slow(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/rest/slow", &headers);
    tokio::time::sleep(Duration::from_secs(3)).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn token(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let n = state.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(state.refresh_delay).await;

    if state.reject_refresh || headers.get("apikey").is_none() || body["refresh_token"].as_str().is_none() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" }))).into_response();
    }

    let access_token = format!("access-{n}");
    state.accepted_tokens.lock().unwrap().insert(access_token.clone());
    Json(json!({
        "access_token": access_token,
        "refresh_token": format!("refresh-{n}"),
        "token_type": "bearer",
        "expires_in": 3600,
    }))
    .into_response()
}

async fn logout(State(state): State<Arc<MockState>>) -> Response {
    state.sign_out_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT.into_response()
}
