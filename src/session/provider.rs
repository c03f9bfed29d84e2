use crate::domain::session::{Session, now_unix};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No session to refresh")]
    NoSession,
    #[error("Refresh of this session already failed")]
    AlreadyFailed,
    #[error("Refresh token rejected ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("Auth provider unreachable: {0}")]
    Network(String),
    #[error("Unexpected auth provider response ({status}): {body}")]
    Unexpected { status: StatusCode, body: String },
}

/// The third-party authentication service that owns token issuance.
#[async_trait]
pub trait AuthProvider: Send + Sync + std::fmt::Debug {
    /// Exchanges a refresh token for a new session.
    ///
    /// # Errors
    /// Returns `ProviderError::Rejected` when the refresh token is no longer valid.
    async fn refresh(&self, refresh_token: &str) -> Result<Session, ProviderError>;

    /// Revokes the session on the provider side.
    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self.expires_at.unwrap_or_else(|| now_unix() + self.expires_in.unwrap_or(3600));
        Session::new(self.access_token, self.refresh_token, expires_at)
    }
}

/// Talks to a GoTrue-style auth service (`/token`, `/logout`).
#[derive(Debug, Clone)]
pub struct HttpAuthProvider {
    http: reqwest::Client,
    auth_url: String,
    anon_key: Option<String>,
}

impl HttpAuthProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, auth_url: &str, anon_key: Option<String>) -> Self {
        Self { http, auth_url: auth_url.trim_end_matches('/').to_string(), anon_key }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.post(format!("{}{}", self.auth_url, path));
        match &self.anon_key {
            Some(key) => builder.header("apikey", key),
            None => builder,
        }
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    #[tracing::instrument(skip_all, err(level = "warn"))]
    async fn refresh(&self, refresh_token: &str) -> Result<Session, ProviderError> {
        let response = self
            .post("/token?grant_type=refresh_token")
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let tokens: TokenResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Unexpected { status, body: e.to_string() })?;
            return Ok(tokens.into_session());
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProviderError::Rejected { status, body })
            }
            _ => Err(ProviderError::Unexpected { status, body }),
        }
    }

    #[tracing::instrument(skip_all, err(level = "warn"))]
    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let response = self
            .post("/logout")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        // An already-invalid token means there is nothing left to revoke.
        if status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Unexpected { status, body })
        }
    }
}
