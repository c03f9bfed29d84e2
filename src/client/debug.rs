use crate::domain::request::OutboundRequest;
use reqwest::StatusCode;
use std::time::Duration;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_LOGGED_BODY: usize = 2048;

/// Time-ordered, so ids sort in the order requests were issued.
pub(crate) fn next_request_id() -> String {
    Uuid::now_v7().to_string()
}

pub(crate) fn log_request(request: &OutboundRequest) {
    let payload = request.body().map(ToString::to_string).unwrap_or_default();
    tracing::debug!(
        request_id = request.header(REQUEST_ID_HEADER).unwrap_or_default(),
        method = %request.method(),
        url = %request.url(),
        retried = request.retried(),
        payload = %truncate(&payload),
        "Sending request"
    );
}

pub(crate) fn log_response(request: &OutboundRequest, status: StatusCode, body: &[u8], elapsed: Duration) {
    let body = String::from_utf8_lossy(body);
    tracing::debug!(
        request_id = request.header(REQUEST_ID_HEADER).unwrap_or_default(),
        method = %request.method(),
        url = %request.url(),
        status = status.as_u16(),
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        payload = %truncate(&body),
        "Received response"
    );
}

fn truncate(text: &str) -> &str {
    if text.len() <= MAX_LOGGED_BODY {
        return text;
    }
    let mut end = MAX_LOGGED_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
