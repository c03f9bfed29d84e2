use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

/// An authenticated identity: the access/refresh token pair and when the
/// access token stops being accepted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp in seconds.
    pub expires_at: i64,
}

impl Session {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>, expires_at: i64) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into(), expires_at }
    }

    /// Builds a session whose access token lives for `expires_in` seconds from now.
    #[must_use]
    pub fn expiring_in(access_token: impl Into<String>, refresh_token: impl Into<String>, expires_in: i64) -> Self {
        Self::new(access_token, refresh_token, now_unix() + expires_in)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        now_unix() >= self.expires_at
    }

    #[must_use]
    pub fn expires_within(&self, margin: Duration) -> bool {
        let margin = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
        now_unix().saturating_add(margin) >= self.expires_at
    }

    /// Seconds until expiry, negative once expired.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        self.expires_at - now_unix()
    }

    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub(crate) fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        let live = Session::expiring_in("a", "r", 3600);
        assert!(!live.is_expired());
        assert!(live.expires_within(Duration::from_secs(7200)));
        assert!(!live.expires_within(Duration::from_secs(60)));

        let dead = Session::expiring_in("a", "r", -10);
        assert!(dead.is_expired());
        assert!(dead.remaining_secs() < 0);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let session = Session::new("secret-access", "secret-refresh", 0);
        let rendered = format!("{session:?}");

        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert_eq!(session.bearer(), "Bearer secret-access");
    }
}
