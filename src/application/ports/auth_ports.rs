/**
 * Application-facing ports for the thin auth/session glue. Implemented
 * directly by Postgres repositories in `infrastructure::repositories::pg`
 * (no intervening domain repository trait, since user/session storage is
 * plain CRUD with no domain invariants beyond what Postgres already
 * enforces via unique constraints).
 */
use async_trait::async_trait;
use uuid::Uuid;

use crate::common::errors::DomainError;
use crate::domain::entities::session::Session;
use crate::domain::entities::user::{User, UserQuota};

#[async_trait]
pub trait UserStoragePort: Send + Sync + 'static {
    async fn create_user(&self, username: &str, password_hash: &str, quota_bytes: i64) -> Result<User, DomainError>;
    async fn get_user_by_id(&self, id: &Uuid) -> Result<User, DomainError>;
    async fn get_user_by_username(&self, username: &str) -> Result<User, DomainError>;
    async fn get_quota(&self, user_id: &Uuid) -> Result<UserQuota, DomainError>;
    async fn adjust_used_bytes(&self, user_id: &Uuid, delta: i64) -> Result<(), DomainError>;
}

#[async_trait]
pub trait SessionStoragePort: Send + Sync + 'static {
    async fn create_session(&self, session: Session) -> Result<Session, DomainError>;
    async fn get_session_by_refresh_token(&self, refresh_token: &str) -> Result<Session, DomainError>;
    async fn revoke_session(&self, session_id: &Uuid) -> Result<(), DomainError>;
    async fn revoke_all_user_sessions(&self, user_id: &Uuid) -> Result<u64, DomainError>;
}
