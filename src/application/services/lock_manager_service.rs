/**
 * In-memory, token-indexed lock store with a write-through durable
 * mirror. Conflict detection generalizes the ancestor/self/descendant
 * tree walk from a segment-tree lock manager to the flat
 * `NormalizedPath`-prefix model: there is no directory tree to walk, so
 * "ancestor" and "descendant" are just prefix comparisons between
 * collection paths.
 *
 * Both indices live behind one `parking_lot::RwLock` so conflict
 * detection and insertion happen in a single critical section — no
 * window where a second LOCK request can observe a half-inserted lock.
 */
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::application::ports::lock_ports::{LockConflict, LockManagerPort, LockRequest};
use crate::common::errors::DomainError;
use crate::domain::entities::lock::{Lock, LockKind, LockToken};
use crate::domain::entities::lock::LockDepth;
use crate::domain::entities::path::NormalizedPath;
use crate::domain::repositories::lock_repository::LockRepository;

struct Indices {
    by_token: HashMap<LockToken, Lock>,
    by_path: HashMap<NormalizedPath, HashSet<LockToken>>,
}

impl Indices {
    fn new() -> Self {
        Self {
            by_token: HashMap::new(),
            by_path: HashMap::new(),
        }
    }

    fn insert(&mut self, lock: Lock) {
        self.by_path
            .entry(lock.resource_path.clone())
            .or_default()
            .insert(lock.token.clone());
        self.by_token.insert(lock.token.clone(), lock);
    }

    fn remove(&mut self, token: &LockToken) -> Option<Lock> {
        let lock = self.by_token.remove(token)?;
        if let Some(set) = self.by_path.get_mut(&lock.resource_path) {
            set.remove(token);
            if set.is_empty() {
                self.by_path.remove(&lock.resource_path);
            }
        }
        Some(lock)
    }

    /// Locks whose scope covers `path`: locks directly on `path`, plus
    /// any ancestor-collection lock with infinite depth. Expiration is a
    /// lazy read-time check, not just a property of the periodic sweep —
    /// a lock past `expires_at` must never be reported as covering
    /// anything, whether or not the sweep has reached it yet.
    fn covering(&self, path: &NormalizedPath, now: chrono::DateTime<Utc>) -> Vec<Lock> {
        self.by_token
            .values()
            .filter(|l| !l.is_expired_at(now))
            .filter(|l| {
                l.resource_path == *path
                    || (l.depth == LockDepth::Infinity && path.starts_with(&l.resource_path))
            })
            .cloned()
            .collect()
    }

    /// Locks strictly inside the collection at `path` (used when placing
    /// a new lock on a collection: its descendants must not already hold
    /// an incompatible lock).
    fn descendants(&self, path: &NormalizedPath, now: chrono::DateTime<Utc>) -> Vec<Lock> {
        self.by_token
            .values()
            .filter(|l| !l.is_expired_at(now))
            .filter(|l| l.resource_path != *path && l.resource_path.starts_with(path))
            .cloned()
            .collect()
    }

    /// Non-expired lookup by token, used everywhere the lock index is
    /// consulted on a single token (UNLOCK, LOCK refresh, `If` evaluation).
    fn live_by_token(&self, token: &LockToken, now: chrono::DateTime<Utc>) -> Option<Lock> {
        self.by_token.get(token).filter(|l| !l.is_expired_at(now)).cloned()
    }
}

fn kinds_conflict(existing: LockKind, requested: LockKind) -> bool {
    !(existing == LockKind::Shared && requested == LockKind::Shared)
}

pub struct LockManagerService {
    indices: RwLock<Indices>,
    repository: Arc<dyn LockRepository>,
    max_timeout_seconds: i64,
}

impl LockManagerService {
    pub fn new(repository: Arc<dyn LockRepository>, max_timeout_seconds: i64) -> Self {
        Self {
            indices: RwLock::new(Indices::new()),
            repository,
            max_timeout_seconds,
        }
    }

    /// Rehydrates the in-memory index from the durable mirror at startup.
    /// The index is process-wide (shared across every tenant), so this
    /// loads every still-live lock regardless of owning user.
    pub async fn rehydrate(&self) -> Result<u64, DomainError> {
        let now = Utc::now();
        let locks = self.repository.load_all_active(now).await?;
        let mut indices = self.indices.write();
        let mut count = 0u64;
        for lock in locks {
            if !lock.is_expired_at(now) {
                indices.insert(lock);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Periodic sweep: drops expired locks from both the in-memory index
    /// and the durable mirror. Called from a background `tokio::time::interval`
    /// task in `main.rs`, not from the request path.
    pub async fn sweep_expired(&self) -> Result<u64, DomainError> {
        let now = Utc::now();
        let expired_tokens: Vec<LockToken> = {
            let indices = self.indices.read();
            indices
                .by_token
                .values()
                .filter(|l| l.is_expired_at(now))
                .map(|l| l.token.clone())
                .collect()
        };

        {
            let mut indices = self.indices.write();
            for token in &expired_tokens {
                indices.remove(token);
            }
        }

        self.repository.remove_expired(now).await?;
        Ok(expired_tokens.len() as u64)
    }

    /// `Second-0` (and anything the header parser couldn't turn into a
    /// positive duration, including a negative value or `Infinite`) falls
    /// back to the configured default/max rather than flooring to 1s — per
    /// spec.md §8's boundary behavior, a zero/negative timeout clamps to
    /// the default, it does not become a 1-second lock.
    fn clamp_timeout(&self, requested: Option<Duration>) -> i64 {
        match requested.map(|d| d.as_secs() as i64) {
            Some(secs) if secs > 0 => secs.min(self.max_timeout_seconds),
            _ => self.max_timeout_seconds,
        }
    }
}

#[async_trait]
impl LockManagerPort for LockManagerService {
    async fn create_lock(&self, request: LockRequest) -> Result<Lock, LockConflict> {
        let timeout_seconds = self.clamp_timeout(request.timeout);
        let now = Utc::now();

        let lock = {
            let mut indices = self.indices.write();

            for existing in indices.covering(&request.path, now) {
                if kinds_conflict(existing.kind, request.kind) {
                    return Err(LockConflict::LockedByOther(existing));
                }
            }
            if request.path.is_collection() && request.depth == LockDepth::Infinity {
                for existing in indices.descendants(&request.path, now) {
                    if kinds_conflict(existing.kind, request.kind) {
                        return Err(LockConflict::LockedByOther(existing));
                    }
                }
            }

            let lock = Lock {
                token: LockToken::new(),
                user_id: request.user_id,
                kind: request.kind,
                owner: request.owner,
                resource_path: request.path,
                depth: request.depth,
                created_at: now,
                expires_at: now + chrono::Duration::seconds(timeout_seconds),
                timeout_seconds,
            };

            indices.insert(lock.clone());
            lock
        };

        if let Err(e) = self.repository.upsert(&lock).await {
            tracing::warn!("failed to persist lock {} to durable mirror: {}", lock.token, e);
        }

        Ok(lock)
    }

    async fn refresh_lock(&self, token: &LockToken, timeout: Option<Duration>) -> Result<Lock, DomainError> {
        let timeout_seconds = self.clamp_timeout(timeout);
        let now = Utc::now();

        let refreshed = {
            let mut indices = self.indices.write();
            let existing = indices
                .live_by_token(token, now)
                .ok_or_else(|| DomainError::not_found("Lock", token.as_str()))?;
            let refreshed = existing.refreshed(now, timeout_seconds);
            indices.insert(refreshed.clone());
            refreshed
        };

        self.repository.upsert(&refreshed).await?;
        Ok(refreshed)
    }

    async fn remove_lock(&self, token: &LockToken) -> Result<(), DomainError> {
        {
            let mut indices = self.indices.write();
            indices.remove(token);
        }
        self.repository.remove(token).await
    }

    async fn discover_locks(&self, path: &NormalizedPath) -> Vec<Lock> {
        self.indices.read().covering(path, Utc::now())
    }

    async fn find_by_token(&self, token: &LockToken) -> Option<Lock> {
        self.indices.read().live_by_token(token, Utc::now())
    }

    fn check_write_access(
        &self,
        path: &NormalizedPath,
        requesting_user_id: Uuid,
        submitted_tokens: &[LockToken],
    ) -> Result<(), LockConflict> {
        let indices = self.indices.read();
        for lock in indices.covering(path, Utc::now()) {
            let owned_by_requester = lock.user_id == requesting_user_id;
            let token_presented = submitted_tokens.contains(&lock.token);
            if !owned_by_requester && !token_presented {
                return Err(LockConflict::LockedByOther(lock));
            }
        }
        Ok(())
    }
}
