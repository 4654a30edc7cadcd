use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::auth_ports::UserStoragePort;
use crate::common::errors::DomainError;
use crate::domain::entities::user::{User, UserQuota};

pub struct UserPgRepository {
    pool: Arc<PgPool>,
}

impl UserPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn row_to_user(row: sqlx::postgres::PgRow) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            quota_bytes: row.get("quota_bytes"),
            used_bytes: row.get("used_bytes"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl UserStoragePort for UserPgRepository {
    async fn create_user(&self, username: &str, password_hash: &str, quota_bytes: i64) -> Result<User, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO auth.users (id, username, password_hash, quota_bytes, used_bytes, created_at)
            VALUES ($1, $2, $3, $4, 0, NOW())
            RETURNING id, username, password_hash, quota_bytes, used_bytes, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(quota_bytes)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DomainError::already_exists("User", username)
            }
            other => DomainError::from(other),
        })?;

        Ok(Self::row_to_user(row))
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<User, DomainError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, quota_bytes, used_bytes, created_at FROM auth.users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&*self.pool)
        .await
        .map_err(DomainError::from)?;

        Ok(Self::row_to_user(row))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, DomainError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, quota_bytes, used_bytes, created_at FROM auth.users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&*self.pool)
        .await
        .map_err(DomainError::from)?;

        Ok(Self::row_to_user(row))
    }

    async fn get_quota(&self, user_id: &Uuid) -> Result<UserQuota, DomainError> {
        let row = sqlx::query("SELECT quota_bytes, used_bytes FROM auth.users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&*self.pool)
            .await
            .map_err(DomainError::from)?;

        Ok(UserQuota {
            quota_bytes: row.get("quota_bytes"),
            used_bytes: row.get("used_bytes"),
        })
    }

    async fn adjust_used_bytes(&self, user_id: &Uuid, delta: i64) -> Result<(), DomainError> {
        sqlx::query("UPDATE auth.users SET used_bytes = GREATEST(used_bytes + $1, 0) WHERE id = $2")
            .bind(delta)
            .bind(user_id)
            .execute(&*self.pool)
            .await
            .map_err(DomainError::from)?;

        Ok(())
    }
}
