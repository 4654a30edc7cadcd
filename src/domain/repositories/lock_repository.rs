use async_trait::async_trait;
use std::result::Result;
use uuid::Uuid;

use crate::common::errors::DomainError;
use crate::domain::entities::lock::{Lock, LockToken};
use crate::domain::entities::path::NormalizedPath;

pub type LockRepositoryResult<T> = Result<T, DomainError>;

/// Durable mirror of the in-memory lock index. Write-through on every
/// mutation; read only at startup (rehydration) and for operator audit
/// queries, never on the request hot path.
#[async_trait]
pub trait LockRepository: Send + Sync + 'static {
    async fn upsert(&self, lock: &Lock) -> LockRepositoryResult<()>;
    async fn remove(&self, token: &LockToken) -> LockRepositoryResult<()>;
    async fn remove_expired(&self, now: chrono::DateTime<chrono::Utc>) -> LockRepositoryResult<u64>;
    /// Every non-expired lock across all tenants, for startup rehydration.
    /// The in-memory index is process-wide, not per-user, so rehydration
    /// cannot be scoped to a single `user_id`.
    async fn load_all_active(&self, now: chrono::DateTime<chrono::Utc>) -> LockRepositoryResult<Vec<Lock>>;
    async fn load_by_path(&self, user_id: Uuid, path: &NormalizedPath) -> LockRepositoryResult<Vec<Lock>>;
}
