use async_trait::async_trait;
use std::result::Result;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::session::Session;

#[derive(Debug, Error)]
pub enum SessionRepositoryError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    DatabaseError(String),
}

pub type SessionRepositoryResult<T> = Result<T, SessionRepositoryError>;

#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    async fn create_session(&self, session: Session) -> SessionRepositoryResult<Session>;
    async fn get_session_by_id(&self, id: &Uuid) -> SessionRepositoryResult<Session>;
    async fn get_session_by_refresh_token(&self, refresh_token: &str) -> SessionRepositoryResult<Session>;
    async fn get_sessions_by_user_id(&self, user_id: &Uuid) -> SessionRepositoryResult<Vec<Session>>;
    async fn revoke_session(&self, session_id: &Uuid) -> SessionRepositoryResult<()>;
    async fn revoke_all_user_sessions(&self, user_id: &Uuid) -> SessionRepositoryResult<u64>;
    async fn delete_expired_sessions(&self) -> SessionRepositoryResult<u64>;
}
