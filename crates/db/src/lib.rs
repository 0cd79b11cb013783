pub mod connection;
pub mod locks;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_settings, DbPool};
pub use locks::ConversationLocks;
pub use repositories::{
    InMemorySessionRepository, RepositoryError, SessionRepository, SqlSessionRepository,
};
