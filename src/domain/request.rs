use crate::domain::session::Session;
use reqwest::{Method, Url};
use serde_json::Value;
use std::collections::BTreeMap;

pub const AUTHORIZATION: &str = "authorization";

/// Where a request stands in its refresh-and-retry cycle.
///
/// The only transition is `Initial -> RetriedOnce`, taken after a 401 was
/// answered by a successful refresh. There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Attempt {
    #[default]
    Initial,
    RetriedOnce,
}

/// One logical call to the backend. Survives across the retry so the second
/// attempt is the exact same request with a fresh bearer token.
#[derive(Clone)]
pub struct OutboundRequest {
    method: Method,
    url: Url,
    headers: BTreeMap<String, String>,
    body: Option<Value>,
    attempt: Attempt,
}

impl OutboundRequest {
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: BTreeMap::new(), body: None, attempt: Attempt::Initial }
    }

    #[must_use]
    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// Header names are case-insensitive on the wire, so they are stored lowercased.
    #[must_use]
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.set_header(name.as_ref(), value);
        }
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Attaches the session's bearer token, replacing any previous one.
    pub fn authorize(&mut self, session: &Session) {
        self.set_header(AUTHORIZATION, session.bearer());
    }

    /// Moves the request into its single retry. Returns `false` when the
    /// retry was already spent, in which case nothing changes.
    pub fn mark_retried(&mut self) -> bool {
        match self.attempt {
            Attempt::Initial => {
                self.attempt = Attempt::RetriedOnce;
                true
            }
            Attempt::RetriedOnce => false,
        }
    }

    #[must_use]
    pub fn retried(&self) -> bool {
        self.attempt == Attempt::RetriedOnce
    }

    #[must_use]
    pub const fn attempt(&self) -> Attempt {
        self.attempt
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

impl std::fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), if k == AUTHORIZATION { "<redacted>" } else { v.as_str() }))
            .collect();

        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &headers)
            .field("body", &self.body)
            .field("attempt", &self.attempt)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OutboundRequest {
        OutboundRequest::new(Method::GET, Url::parse("http://localhost/api/users/me").unwrap())
    }

    #[test]
    fn test_retry_is_spent_once() {
        let mut req = request();
        assert!(!req.retried());
        assert_eq!(req.attempt(), Attempt::Initial);

        assert!(req.mark_retried());
        assert!(req.retried());

        assert!(!req.mark_retried());
        assert_eq!(req.attempt(), Attempt::RetriedOnce);
    }

    #[test]
    fn test_authorize_replaces_caller_header() {
        let mut req = request().with_headers([("Authorization", "Bearer stale")]);
        req.authorize(&Session::new("fresh", "r", 0));

        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer fresh"));
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn test_debug_redacts_bearer() {
        let mut req = request();
        req.authorize(&Session::new("top-secret", "r", 0));

        assert!(!format!("{req:?}").contains("top-secret"));
    }
}
