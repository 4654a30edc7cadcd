/**
 * `dav.dead_properties`-backed PROPPATCH/PROPFIND property store. Batched
 * updates run inside one transaction via `transaction_utils::with_transaction`
 * so a PROPPATCH's ordered set/remove operations are all-or-nothing at the
 * storage layer (per-operation failure is still reported back to the caller
 * as an independent outcome, matching the "ordered PROPPATCH operations"
 * design note).
 */
use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::common::errors::DomainError;
use crate::domain::entities::path::NormalizedPath;
use crate::domain::entities::property::{DeadProperty, PropertyName};
use crate::domain::repositories::property_repository::{
    PropertyRepository, PropertyRepositoryResult, PropertyUpdate, PropertyUpdateOutcome,
};
use crate::infrastructure::repositories::pg::transaction_utils::with_transaction;

pub struct PropertyPgRepository {
    pool: Arc<PgPool>,
    max_value_bytes: usize,
}

impl PropertyPgRepository {
    pub fn new(pool: Arc<PgPool>, max_value_bytes: usize) -> Self {
        Self { pool, max_value_bytes }
    }

    fn row_to_property(row: sqlx::postgres::PgRow) -> DeadProperty {
        DeadProperty {
            user_id: row.get("user_id"),
            path: NormalizedPath::parse(&row.get::<String, _>("path")).unwrap_or_else(|_| NormalizedPath::root()),
            name: PropertyName::new(row.get::<String, _>("namespace"), row.get::<String, _>("name")),
            value: row.get("value"),
            is_live: row.get("is_live"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl PropertyRepository for PropertyPgRepository {
    async fn get_all(&self, user_id: Uuid, path: &NormalizedPath) -> PropertyRepositoryResult<Vec<DeadProperty>> {
        let rows = sqlx::query("SELECT * FROM dav.dead_properties WHERE user_id = $1 AND path = $2")
            .bind(user_id)
            .bind(path.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(DomainError::from)?;

        Ok(rows.into_iter().map(Self::row_to_property).collect())
    }

    async fn get_one(
        &self,
        user_id: Uuid,
        path: &NormalizedPath,
        name: &PropertyName,
    ) -> PropertyRepositoryResult<Option<DeadProperty>> {
        let row = sqlx::query(
            "SELECT * FROM dav.dead_properties WHERE user_id = $1 AND path = $2 AND namespace = $3 AND name = $4",
        )
        .bind(user_id)
        .bind(path.as_str())
        .bind(&name.namespace)
        .bind(&name.name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(DomainError::from)?;

        Ok(row.map(Self::row_to_property))
    }

    async fn apply_updates(
        &self,
        user_id: Uuid,
        path: &NormalizedPath,
        updates: Vec<PropertyUpdate>,
    ) -> PropertyRepositoryResult<Vec<PropertyUpdateOutcome>> {
        let path_str = path.as_str().to_string();
        let max_value_bytes = self.max_value_bytes;

        with_transaction(&self.pool, "proppatch_apply_updates", |tx| {
            Box::pin(async move {
                let mut outcomes = Vec::with_capacity(updates.len());

                for update in updates {
                    match update {
                        PropertyUpdate::Set { name, value } => {
                            if name.namespace.is_empty() || name.name.is_empty() {
                                outcomes.push(PropertyUpdateOutcome {
                                    name,
                                    result: Err(DomainError::validation_error(
                                        "property namespace and name must be non-empty",
                                    )),
                                });
                                continue;
                            }
                            if value.len() > max_value_bytes {
                                outcomes.push(PropertyUpdateOutcome {
                                    name,
                                    result: Err(DomainError::validation_error(format!(
                                        "property value exceeds {} bytes",
                                        max_value_bytes
                                    ))),
                                });
                                continue;
                            }

                            let result = sqlx::query(
                                r#"
                                INSERT INTO dav.dead_properties (
                                    user_id, path, namespace, name, value, is_live, created_at, updated_at
                                ) VALUES ($1, $2, $3, $4, $5, false, NOW(), NOW())
                                ON CONFLICT (user_id, path, namespace, name) DO UPDATE SET
                                    value = EXCLUDED.value,
                                    updated_at = NOW()
                                "#,
                            )
                            .bind(user_id)
                            .bind(&path_str)
                            .bind(&name.namespace)
                            .bind(&name.name)
                            .bind(&value)
                            .execute(&mut **tx)
                            .await
                            .map_err(DomainError::from);

                            outcomes.push(PropertyUpdateOutcome {
                                name,
                                result: result.map(|_| ()),
                            });
                        }
                        PropertyUpdate::Remove { name } => {
                            let result = sqlx::query(
                                "DELETE FROM dav.dead_properties WHERE user_id = $1 AND path = $2 AND namespace = $3 AND name = $4",
                            )
                            .bind(user_id)
                            .bind(&path_str)
                            .bind(&name.namespace)
                            .bind(&name.name)
                            .execute(&mut **tx)
                            .await
                            .map_err(DomainError::from);

                            outcomes.push(PropertyUpdateOutcome {
                                name,
                                result: result.map(|_| ()),
                            });
                        }
                    }
                }

                Ok(outcomes)
            }) as BoxFuture<'_, PropertyRepositoryResult<Vec<PropertyUpdateOutcome>>>
        })
        .await
    }
}

