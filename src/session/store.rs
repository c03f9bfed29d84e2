use crate::domain::session::Session;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Holder of the process-wide session. Writes are last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    async fn get(&self) -> Option<Session>;
    async fn set(&self, session: Session);
    async fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self { session: RwLock::new(Some(session)) }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn set(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    async fn clear(&self) {
        *self.session.write().await = None;
    }
}
