use crate::domain::session::Session;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod provider;
pub mod store;

use provider::{AuthProvider, ProviderError};
use store::SessionStore;

#[derive(Clone, Debug)]
struct Metrics {
    refresh_total: Counter<u64>,
    sign_out_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("respect-client");
        Self {
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Session refresh attempts by result")
                .build(),
            sign_out_total: meter
                .u64_counter("auth_sign_out_total")
                .with_description("Total number of sign-outs")
                .build(),
        }
    }
}

/// Session lifecycle on top of a store and an auth provider.
///
/// With single-flight enabled, refreshes are serialized: a caller that waited
/// behind another refresh and finds the token already rotated gets the new
/// session without hitting the provider again. A caller that waited behind a
/// failed refresh of the same token fails with `ProviderError::AlreadyFailed`.
#[derive(Debug)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn AuthProvider>,
    /// Holds the access token whose last refresh failed.
    refresh_guard: Option<Mutex<Option<String>>>,
    metrics: Metrics,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, provider: Arc<dyn AuthProvider>) -> Self {
        Self { store, provider, refresh_guard: Some(Mutex::new(None)), metrics: Metrics::new() }
    }

    #[must_use]
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.refresh_guard = enabled.then(|| Mutex::new(None));
        self
    }

    #[must_use]
    pub const fn single_flight(&self) -> bool {
        self.refresh_guard.is_some()
    }

    pub async fn get_session(&self) -> Option<Session> {
        self.store.get().await
    }

    /// Stores a session obtained from the login flow.
    pub async fn sign_in(&self, session: Session) {
        self.store.set(session).await;
    }

    /// Exchanges the stored refresh token for a new session and stores it.
    ///
    /// `stale_access_token` is the token the caller saw rejected.
    ///
    /// # Errors
    /// Returns `ProviderError::NoSession` when nothing is stored,
    /// `ProviderError::AlreadyFailed` when a serialized refresh of the same
    /// session just failed, otherwise whatever the provider failed with. The
    /// store is left untouched on error.
    #[tracing::instrument(skip_all, fields(single_flight = self.single_flight()), err(level = "warn"))]
    pub async fn refresh_session(&self, stale_access_token: Option<&str>) -> Result<Session, ProviderError> {
        let mut last_failed = match &self.refresh_guard {
            Some(guard) => Some(guard.lock().await),
            None => None,
        };

        let current = self.store.get().await.ok_or(ProviderError::NoSession)?;

        if let Some(failed) = last_failed.as_deref()
            && failed.as_deref() == Some(current.access_token.as_str())
        {
            tracing::debug!("Refresh of this session already failed");
            self.metrics.refresh_total.add(1, &[KeyValue::new("result", "coalesced_failure")]);
            return Err(ProviderError::AlreadyFailed);
        }

        if last_failed.is_some()
            && let Some(stale) = stale_access_token
            && current.access_token != stale
        {
            tracing::debug!("Session already rotated by a concurrent refresh");
            self.metrics.refresh_total.add(1, &[KeyValue::new("result", "coalesced")]);
            return Ok(current);
        }

        let result = self.provider.refresh(&current.refresh_token).await;
        if let Some(failed) = last_failed.as_deref_mut() {
            *failed = result.is_err().then(|| current.access_token.clone());
        }

        match result {
            Ok(session) => {
                self.store.set(session.clone()).await;
                self.metrics.refresh_total.add(1, &[KeyValue::new("result", "refreshed")]);
                tracing::info!(expires_at = session.expires_at, "Session refreshed");
                Ok(session)
            }
            Err(e) => {
                self.metrics.refresh_total.add(1, &[KeyValue::new("result", "failed")]);
                Err(e)
            }
        }
    }

    /// Revokes the session with the provider when possible and always clears the store.
    #[tracing::instrument(skip_all)]
    pub async fn sign_out(&self) {
        if let Some(session) = self.store.get().await
            && let Err(e) = self.provider.sign_out(&session.access_token).await
        {
            tracing::warn!(error = %e, "Provider sign-out failed, clearing local session anyway");
        }

        self.store.clear().await;
        self.metrics.sign_out_total.add(1, &[]);
        tracing::info!("Signed out");
    }
}
