use async_trait::async_trait;
use std::result::Result;
use uuid::Uuid;

use crate::common::errors::DomainError;
use crate::domain::entities::path::NormalizedPath;
use crate::domain::entities::property::{DeadProperty, PropertyName};

pub type PropertyRepositoryResult<T> = Result<T, DomainError>;

/// A single PROPPATCH mutation, in request order. Ordering matters:
/// spec semantics process `set`/`remove` operations in document order
/// within one PROPPATCH, each independently succeeding or failing.
#[derive(Debug, Clone)]
pub enum PropertyUpdate {
    Set { name: PropertyName, value: String },
    Remove { name: PropertyName },
}

#[async_trait]
pub trait PropertyRepository: Send + Sync + 'static {
    async fn get_all(&self, user_id: Uuid, path: &NormalizedPath) -> PropertyRepositoryResult<Vec<DeadProperty>>;
    async fn get_one(
        &self,
        user_id: Uuid,
        path: &NormalizedPath,
        name: &PropertyName,
    ) -> PropertyRepositoryResult<Option<DeadProperty>>;

    /// Applies a PROPPATCH's ordered set/remove operations inside a single
    /// transaction, returning the per-operation outcome in the same order
    /// (so the caller can build a 207 Multi-Status `propstat` per name).
    async fn apply_updates(
        &self,
        user_id: Uuid,
        path: &NormalizedPath,
        updates: Vec<PropertyUpdate>,
    ) -> PropertyRepositoryResult<Vec<PropertyUpdateOutcome>>;
}

#[derive(Debug, Clone)]
pub struct PropertyUpdateOutcome {
    pub name: PropertyName,
    pub result: Result<(), DomainError>,
}
