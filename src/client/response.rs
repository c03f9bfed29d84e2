use crate::error::{ApiError, Result};
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// A successful (2xx) response, body not yet parsed.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    /// Parses the body as JSON. An empty body (e.g. 204) parses as `null`.
    ///
    /// # Errors
    /// Returns `ApiError::Decode` when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let parsed = if self.body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(&self.body)
        };

        parsed.map_err(|e| ApiError::Decode { status: self.status, message: e.to_string() })
    }
}

/// Maps a response onto success or the error taxonomy. 401 comes back as
/// `AuthExpired`; whether it gets recovered is the caller's decision.
pub(crate) fn classify(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Result<ApiResponse> {
    if status.is_success() {
        return Ok(ApiResponse { status, body });
    }

    let body_text = String::from_utf8_lossy(&body).into_owned();
    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::AuthExpired { status, body: body_text },
        StatusCode::TOO_MANY_REQUESTS => {
            ApiError::RateLimited { status, body: body_text, retry_after: retry_after(headers) }
        }
        s if s.is_server_error() => ApiError::ServerError { status, body: body_text },
        _ => ApiError::ClientError { status, body: body_text },
    })
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn network_error(e: &reqwest::Error) -> ApiError {
    if e.is_builder() {
        return ApiError::InvalidRequest(e.to_string());
    }

    let message = if e.is_timeout() { format!("request timed out: {e}") } else { e.to_string() };
    ApiError::NetworkError { message }
}
