/**
 * Capability seam over the flat S3-style object store. `S3ObjectStore`
 * (infrastructure) is the production implementation; a `MemoryObjectStore`
 * fake backs unit tests for the Method Engine without a real backend.
 */
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::path::NormalizedPath;

#[derive(Debug, Error, Clone)]
pub enum ObjectStoreError {
    #[error("object not found")]
    NotFound,
    #[error("object already exists")]
    AlreadyExists,
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ObjectStat {
    pub path: NormalizedPath,
    pub size: u64,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_collection: bool,
}

#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub path: NormalizedPath,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub is_collection: bool,
}

pub type ObjectBody = BoxStream<'static, Result<Bytes, ObjectStoreError>>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Idempotent: creates the user's bucket if it doesn't already exist.
    /// Callers memoize the result per process to avoid a round trip per
    /// request.
    async fn ensure_bucket(&self, user_id: Uuid) -> Result<(), ObjectStoreError>;

    async fn stat(&self, user_id: Uuid, path: &NormalizedPath) -> Result<ObjectStat, ObjectStoreError>;

    async fn get(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(ObjectStat, ObjectBody), ObjectStoreError>;

    async fn put(
        &self,
        user_id: Uuid,
        path: &NormalizedPath,
        body: Bytes,
        content_type: &str,
    ) -> Result<PutOutcome, ObjectStoreError>;

    async fn delete(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(), ObjectStoreError>;

    async fn list(
        &self,
        user_id: Uuid,
        prefix: &NormalizedPath,
        recursive: bool,
    ) -> Result<Vec<ObjectEntry>, ObjectStoreError>;

    /// Non-atomic: copies then (for `mv`) deletes. No compensation on
    /// partial failure — the destination may exist without the source
    /// having been removed if `mv`'s delete step fails.
    async fn copy(&self, user_id: Uuid, src: &NormalizedPath, dst: &NormalizedPath) -> Result<(), ObjectStoreError>;
    async fn mv(&self, user_id: Uuid, src: &NormalizedPath, dst: &NormalizedPath) -> Result<(), ObjectStoreError>;

    async fn create_folder(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(), ObjectStoreError>;

    /// Lists the prefix and issues a batched delete. Partial failure
    /// (some keys deleted, some not) is surfaced but not repaired.
    async fn delete_folder(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(), ObjectStoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Overwritten,
}
