use crate::config::ApiConfig;
use crate::domain::navigation::{Location, Redirect, SharedLocation};
use crate::domain::request::OutboundRequest;
use crate::error::{ApiError, Result};
use crate::session::SessionManager;
use crate::session::provider::ProviderError;
use opentelemetry::{KeyValue, global, metrics::Counter};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod debug;
pub mod response;

pub use debug::REQUEST_ID_HEADER;
pub use response::ApiResponse;

#[derive(Clone, Debug)]
struct Metrics {
    requests_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("respect-client");
        Self {
            requests_total: meter
                .u64_counter("api_requests_total")
                .with_description("Backend calls by final outcome")
                .build(),
        }
    }
}

/// HTTP client for the backend that keeps the bearer token fresh.
///
/// A 401 triggers one session refresh followed by one retry of the same
/// request. If the refresh fails the session is signed out and the error
/// carries a [`Redirect`] to the login surface.
#[derive(Clone, Debug)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    base_url: Url,
    sessions: Arc<SessionManager>,
    location: Arc<dyn Location>,
    login_path: String,
    debug: bool,
    metrics: Metrics,
}

impl ApiClient {
    #[must_use]
    pub fn builder(base_url: impl Into<String>, sessions: Arc<SessionManager>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            sessions,
            http: None,
            location: None,
            login_path: "/login".to_string(),
            debug: false,
            timeout: None,
        }
    }

    /// # Errors
    /// Returns `ApiError::InvalidRequest` when the configured base URL is not a URL.
    pub fn from_config(
        config: &ApiConfig,
        sessions: Arc<SessionManager>,
        location: Arc<dyn Location>,
    ) -> Result<Self> {
        Self::builder(&config.base_url, sessions)
            .location(location)
            .login_path(&config.login_path)
            .debug(config.debug)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.inner.sessions
    }

    /// Calls `path` and parses the 2xx body as `T`.
    ///
    /// # Errors
    /// See [`ApiError`]. `AuthFailed` means the session has already been signed out.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<HashMap<String, String>>,
    ) -> Result<T> {
        let request = OutboundRequest::new(method, self.resolve(path)?)
            .with_body(body)
            .with_headers(headers.unwrap_or_default());

        self.send(request).await?.json()
    }

    /// Like [`Self::request`], returning the raw JSON value.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn request_value(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.request(method, path, body, None).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None, None).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T> {
        self.request(Method::POST, path, Some(to_json(body)?), None).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn put<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T> {
        self.request(Method::PUT, path, Some(to_json(body)?), None).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn patch<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T> {
        self.request(Method::PATCH, path, Some(to_json(body)?), None).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, None, None).await
    }

    /// Runs a prepared request through the refresh-and-retry cycle.
    ///
    /// # Errors
    /// See [`ApiError`].
    #[tracing::instrument(
        skip_all,
        fields(method = %request.method(), path = request.url().path()),
        err(level = "debug")
    )]
    pub async fn send(&self, mut request: OutboundRequest) -> Result<ApiResponse> {
        if self.inner.debug {
            request.set_header(REQUEST_ID_HEADER, debug::next_request_id());
        }

        // Session tokens only go to the backend's own origin.
        let first_party = request.url().origin() == self.inner.base_url.origin();
        let mut presented = if first_party {
            self.inner.sessions.get_session().await.map(|session| {
                request.authorize(&session);
                session.access_token
            })
        } else {
            tracing::debug!(origin = request.url().origin().ascii_serialization(), "Sending without session");
            None
        };

        let result = loop {
            match self.dispatch(&request).await {
                Err(ApiError::AuthExpired { .. }) if first_party && !request.retried() => {
                    match self.inner.sessions.refresh_session(presented.as_deref()).await {
                        Ok(session) => {
                            request.mark_retried();
                            request.authorize(&session);
                            presented = Some(session.access_token);
                            tracing::debug!("Retrying with refreshed session");
                        }
                        Err(e) => break Err(self.escalate(e).await),
                    }
                }
                other => break other,
            }
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        self.inner.metrics.requests_total.add(1, &[KeyValue::new("outcome", outcome)]);

        result
    }

    async fn dispatch(&self, request: &OutboundRequest) -> Result<ApiResponse> {
        let mut builder = self.inner.http.request(request.method().clone(), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        if self.inner.debug {
            debug::log_request(request);
        }
        let started = Instant::now();

        let response = builder.send().await.map_err(|e| response::network_error(&e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| response::network_error(&e))?;

        if self.inner.debug {
            debug::log_response(request, status, &body, started.elapsed());
        }

        response::classify(status, &headers, body)
    }

    /// Refresh failed: the session is unrecoverable.
    async fn escalate(&self, cause: ProviderError) -> ApiError {
        tracing::warn!(error = %cause, "Session refresh failed, signing out");
        self.inner.sessions.sign_out().await;

        let redirect = Redirect::to_login(&self.inner.login_path, &self.inner.location.current_path());
        if let Some(redirect) = &redirect {
            tracing::info!(path = redirect.path(), "Redirecting to login");
        }

        ApiError::AuthFailed { message: cause.to_string(), redirect }
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(path)
            && matches!(url.scheme(), "http" | "https")
        {
            return Ok(url);
        }

        let joined = format!("{}/{}", self.inner.base_url.as_str().trim_end_matches('/'), path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| ApiError::InvalidRequest(format!("{joined}: {e}")))
    }
}

fn to_json<B: Serialize>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

#[derive(Debug)]
pub struct ApiClientBuilder {
    base_url: String,
    sessions: Arc<SessionManager>,
    http: Option<reqwest::Client>,
    location: Option<Arc<dyn Location>>,
    login_path: String,
    debug: bool,
    timeout: Option<Duration>,
}

impl ApiClientBuilder {
    /// Uses a preconfigured `reqwest::Client`; `timeout` is then ignored.
    #[must_use]
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    #[must_use]
    pub fn location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub const fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// # Errors
    /// Returns `ApiError::InvalidRequest` for a malformed base URL or an HTTP
    /// client that cannot be constructed.
    pub fn build(self) -> Result<ApiClient> {
        let base_url =
            Url::parse(&self.base_url).map_err(|e| ApiError::InvalidRequest(format!("{}: {e}", self.base_url)))?;

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(|e| ApiError::InvalidRequest(e.to_string()))?
            }
        };

        let location = self.location.unwrap_or_else(|| Arc::new(SharedLocation::new("/")));

        Ok(ApiClient {
            inner: Arc::new(Inner {
                http,
                base_url,
                sessions: self.sessions,
                location,
                login_path: self.login_path,
                debug: self.debug,
                metrics: Metrics::new(),
            }),
        })
    }
}
