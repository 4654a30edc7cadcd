/**
 * Business-facing lock operations the Method Engine calls; the concrete
 * `LockManagerService` owns the in-memory index and the durable mirror
 * behind this port.
 */
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::common::errors::DomainError;
use crate::domain::entities::lock::{Lock, LockDepth, LockKind, LockOwner, LockToken};
use crate::domain::entities::path::NormalizedPath;

#[derive(Debug, Clone)]
pub struct LockRequest {
    pub user_id: Uuid,
    pub path: NormalizedPath,
    pub kind: LockKind,
    pub depth: LockDepth,
    pub owner: LockOwner,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub enum LockConflict {
    /// Another lock (possibly on an ancestor or descendant) already
    /// blocks this request.
    LockedByOther(Lock),
}

#[async_trait]
pub trait LockManagerPort: Send + Sync {
    async fn create_lock(&self, request: LockRequest) -> Result<Lock, LockConflict>;

    async fn refresh_lock(&self, token: &LockToken, timeout: Option<Duration>) -> Result<Lock, DomainError>;

    async fn remove_lock(&self, token: &LockToken) -> Result<(), DomainError>;

    /// Returns all locks covering `path`, used both for LOCK conflict
    /// checks and for `lockdiscovery` in PROPFIND responses. Lock scope
    /// is path-based, not tenant-scoped: spec.md §3/§4.3 define the Lock
    /// tuple and conflict algorithm purely in terms of `resource_path`,
    /// with no per-user partition of the index (see DESIGN.md).
    async fn discover_locks(&self, path: &NormalizedPath) -> Vec<Lock>;

    async fn find_by_token(&self, token: &LockToken) -> Option<Lock>;

    /// True if `path` (or an ancestor holding an infinite-depth lock) is
    /// write-locked by a user other than `requesting_user_id`, and the
    /// caller hasn't presented a matching token in `submitted_tokens`.
    /// Per spec.md §4.4, a lock only blocks writes "by another owner" —
    /// the authenticated principal that placed the lock may keep writing
    /// without resending the token on every request. This is checked
    /// against the lock's `user_id` (the authenticated tenant), not its
    /// descriptive `LockOwner` XML payload — a client is free to send a
    /// different `<D:owner>` blob on every LOCK call without losing write
    /// access to its own lock.
    fn check_write_access(
        &self,
        path: &NormalizedPath,
        requesting_user_id: Uuid,
        submitted_tokens: &[LockToken],
    ) -> Result<(), LockConflict>;
}
