use chrono::Utc;
use sqlx::Row;

use relay_core::domain::session::{ConversationId, Session};

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

/// Sessions stored as one JSON document per conversation.
pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, RepositoryError> {
    let payload: String =
        row.try_get("payload").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    serde_json::from_str(&payload).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn get_or_create(&self, id: &ConversationId) -> Result<Session, RepositoryError> {
        let row = sqlx::query(
            "SELECT payload FROM conversation_sessions WHERE conversation_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => row_to_session(r),
            None => Ok(Session::new(id.clone())),
        }
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        let payload =
            serde_json::to_string(&session).map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation_sessions (conversation_id, payload, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 payload = excluded.payload,
                 updated_at = excluded.updated_at",
        )
        .bind(session.id().as_str())
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
