use async_trait::async_trait;
use thiserror::Error;

use relay_core::domain::session::{ConversationId, Session};

pub mod memory;
pub mod session;

pub use memory::InMemorySessionRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Keyed storage of conversation sessions.
///
/// `get_or_create` never fails for an unknown identity: it returns a fresh
/// idle session with empty history. Nothing is written until `save`.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_or_create(&self, id: &ConversationId) -> Result<Session, RepositoryError>;
    async fn save(&self, session: Session) -> Result<(), RepositoryError>;
    async fn ping(&self) -> Result<(), RepositoryError>;
    fn backend(&self) -> &'static str;
}
