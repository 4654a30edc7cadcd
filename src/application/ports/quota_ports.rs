/**
 * Per-user storage quota accounting. Backed by the same `auth.users`
 * table the auth glue already models (`quota_bytes`/`used_bytes`
 * columns); maintained as a single authoritative counter updated by the
 * Method Engine on PUT/DELETE, not derived by walking the object store.
 */
use async_trait::async_trait;
use uuid::Uuid;

use crate::common::errors::DomainError;
use crate::domain::entities::user::UserQuota;

#[async_trait]
pub trait QuotaService: Send + Sync {
    async fn get_quota(&self, user_id: Uuid) -> Result<UserQuota, DomainError>;

    /// Applies `delta` bytes to the user's running total. Eventually
    /// consistent with the object store's actual size: not a hard
    /// integrity invariant, per the concurrency model.
    async fn adjust_used(&self, user_id: Uuid, delta: i64) -> Result<(), DomainError>;

    async fn has_room_for(&self, user_id: Uuid, additional_bytes: i64) -> Result<bool, DomainError> {
        let quota = self.get_quota(user_id).await?;
        Ok(quota.has_room_for(additional_bytes))
    }
}
