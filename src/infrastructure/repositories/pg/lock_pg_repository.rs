/**
 * Durable mirror of the in-memory lock index (`dav.locks`). Write-through
 * on every mutation; read only at startup and by the periodic sweep —
 * never on the request hot path, per the lock manager's design.
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::common::errors::DomainError;
use crate::domain::entities::lock::{Lock, LockDepth, LockKind, LockOwner, LockToken};
use crate::domain::entities::path::NormalizedPath;
use crate::domain::repositories::lock_repository::{LockRepository, LockRepositoryResult};

pub struct LockPgRepository {
    pool: Arc<PgPool>,
}

impl LockPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn row_to_lock(row: sqlx::postgres::PgRow) -> Lock {
        let kind: String = row.get("kind");
        let depth: String = row.get("depth");
        let owner_principal: Option<Uuid> = row.get("owner_principal");
        let owner_opaque: Option<String> = row.get("owner_opaque");

        Lock {
            token: LockToken::from(row.get::<String, _>("token")),
            user_id: row.get("user_id"),
            kind: if kind == "exclusive" { LockKind::Exclusive } else { LockKind::Shared },
            owner: match owner_principal {
                Some(id) => LockOwner::Principal(id),
                None => LockOwner::Opaque(owner_opaque.unwrap_or_default()),
            },
            resource_path: NormalizedPath::parse(&row.get::<String, _>("resource_path")).unwrap(),
            depth: if depth == "infinity" { LockDepth::Infinity } else { LockDepth::Zero },
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            timeout_seconds: row.get("timeout_seconds"),
        }
    }
}

#[async_trait]
impl LockRepository for LockPgRepository {
    async fn upsert(&self, lock: &Lock) -> LockRepositoryResult<()> {
        let (owner_principal, owner_opaque) = match &lock.owner {
            LockOwner::Principal(id) => (Some(*id), None),
            LockOwner::Opaque(blob) => (None, Some(blob.clone())),
        };

        sqlx::query(
            r#"
            INSERT INTO dav.locks (
                token, user_id, kind, owner_principal, owner_opaque,
                resource_path, depth, created_at, expires_at, timeout_seconds
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (token) DO UPDATE SET
                expires_at = EXCLUDED.expires_at,
                timeout_seconds = EXCLUDED.timeout_seconds
            "#,
        )
        .bind(lock.token.as_str())
        .bind(lock.user_id)
        .bind(if lock.kind == LockKind::Exclusive { "exclusive" } else { "shared" })
        .bind(owner_principal)
        .bind(owner_opaque)
        .bind(lock.resource_path.as_str())
        .bind(if lock.depth == LockDepth::Infinity { "infinity" } else { "0" })
        .bind(lock.created_at)
        .bind(lock.expires_at)
        .bind(lock.timeout_seconds)
        .execute(&*self.pool)
        .await
        .map_err(DomainError::from)?;

        Ok(())
    }

    async fn remove(&self, token: &LockToken) -> LockRepositoryResult<()> {
        sqlx::query("DELETE FROM dav.locks WHERE token = $1")
            .bind(token.as_str())
            .execute(&*self.pool)
            .await
            .map_err(DomainError::from)?;

        Ok(())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> LockRepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM dav.locks WHERE expires_at < $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(DomainError::from)?;

        Ok(result.rows_affected())
    }

    async fn load_all_active(&self, now: DateTime<Utc>) -> LockRepositoryResult<Vec<Lock>> {
        let rows = sqlx::query("SELECT * FROM dav.locks WHERE expires_at > $1")
            .bind(now)
            .fetch_all(&*self.pool)
            .await
            .map_err(DomainError::from)?;

        Ok(rows.into_iter().map(Self::row_to_lock).collect())
    }

    async fn load_by_path(&self, user_id: Uuid, path: &NormalizedPath) -> LockRepositoryResult<Vec<Lock>> {
        let rows = sqlx::query("SELECT * FROM dav.locks WHERE user_id = $1 AND resource_path = $2")
            .bind(user_id)
            .bind(path.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(DomainError::from)?;

        Ok(rows.into_iter().map(Self::row_to_lock).collect())
    }
}
