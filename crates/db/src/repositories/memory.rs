use std::collections::HashMap;

use tokio::sync::RwLock;

use relay_core::domain::session::{ConversationId, Session};

use super::{RepositoryError, SessionRepository};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<ConversationId, Session>>,
}

impl InMemorySessionRepository {
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get_or_create(&self, id: &ConversationId) -> Result<Session, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id).cloned().unwrap_or_else(|| Session::new(id.clone())))
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id().clone(), session);
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
