//! Session persistence port
//!
//! Called at round boundaries and on configuration edits, never per turn.

use async_trait::async_trait;
use chorus_domain::{Session, SessionId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, id: &SessionId) -> Result<Session, StoreError>;

    async fn save_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Remove a session. Deleting an unknown session is not an error.
    async fn delete_session(&self, id: &SessionId) -> Result<(), StoreError>;

    async fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError>;
}
