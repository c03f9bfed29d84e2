use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Intent handed back to the calling layer when the session is gone for good.
/// The client never navigates itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Redirect {
    NavigateToLogin { path: String },
}

impl Redirect {
    /// Returns the redirect to `login_path`, or `None` when `current` already is it.
    #[must_use]
    pub fn to_login(login_path: &str, current: &str) -> Option<Self> {
        if normalize(current) == normalize(login_path) {
            None
        } else {
            Some(Self::NavigateToLogin { path: login_path.to_string() })
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::NavigateToLogin { path } => path,
        }
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// The surface the user is currently looking at.
pub trait Location: Send + Sync + std::fmt::Debug {
    fn current_path(&self) -> String;
}

/// A location the caller updates as the user moves around.
#[derive(Debug, Clone, Default)]
pub struct SharedLocation {
    path: Arc<RwLock<String>>,
}

impl SharedLocation {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: Arc::new(RwLock::new(path.into())) }
    }

    pub fn set(&self, path: impl Into<String>) {
        let mut guard = self.path.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = path.into();
    }
}

impl Location for SharedLocation {
    fn current_path(&self) -> String {
        self.path.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}
