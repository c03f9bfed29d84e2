use crate::domain::navigation::Redirect;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired, please sign in again";
pub const SERVER_ERROR_MESSAGE: &str = "Server error, please try again later";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please slow down and try again later";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error, please check your connection";

#[derive(Error, Debug)]
pub enum ApiError {
    /// A 401 the client could not recover from by refreshing.
    #[error("Authentication expired ({status})")]
    AuthExpired { status: StatusCode, body: String },
    /// The refresh itself failed. Sign-out has already happened.
    #[error("Authentication failed: {message}")]
    AuthFailed { message: String, redirect: Option<Redirect> },
    #[error("Rate limited ({status})")]
    RateLimited { status: StatusCode, body: String, retry_after: Option<Duration> },
    #[error("Server error ({status})")]
    ServerError { status: StatusCode, body: String },
    #[error("Network error: {message}")]
    NetworkError { message: String },
    #[error("Request failed ({status}): {body}")]
    ClientError { status: StatusCode, body: String },
    #[error("Invalid response body ({status}): {message}")]
    Decode { status: StatusCode, message: String },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// The message to put in front of a user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthExpired { .. } | Self::AuthFailed { .. } => SESSION_EXPIRED_MESSAGE.to_string(),
            Self::RateLimited { .. } => RATE_LIMITED_MESSAGE.to_string(),
            Self::ServerError { .. } => SERVER_ERROR_MESSAGE.to_string(),
            Self::NetworkError { .. } => NETWORK_ERROR_MESSAGE.to_string(),
            Self::ClientError { status, body } => {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("Request failed").to_string()
                } else {
                    body.clone()
                }
            }
            Self::Decode { .. } => "Unexpected response from the server".to_string(),
            Self::InvalidRequest(msg) => msg.clone(),
        }
    }

    /// The response status exactly as the server sent it, when there was a response.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::AuthExpired { status, .. }
            | Self::RateLimited { status, .. }
            | Self::ServerError { status, .. }
            | Self::ClientError { status, .. }
            | Self::Decode { status, .. } => Some(*status),
            Self::AuthFailed { .. } | Self::NetworkError { .. } | Self::InvalidRequest(_) => None,
        }
    }

    #[must_use]
    pub const fn redirect(&self) -> Option<&Redirect> {
        match self {
            Self::AuthFailed { redirect, .. } => redirect.as_ref(),
            _ => None,
        }
    }

    /// Stable label for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AuthExpired { .. } => "auth_expired",
            Self::AuthFailed { .. } => "auth_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError { .. } => "network_error",
            Self::ClientError { .. } => "client_error",
            Self::Decode { .. } => "decode",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthExpired { .. } | Self::AuthFailed { .. })
    }
}
