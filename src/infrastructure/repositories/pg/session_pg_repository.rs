use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::auth_ports::SessionStoragePort;
use crate::common::errors::DomainError;
use crate::domain::entities::session::Session;
use crate::domain::repositories::session_repository::{
    SessionRepository, SessionRepositoryError, SessionRepositoryResult,
};
use crate::infrastructure::repositories::pg::transaction_utils::with_transaction;

impl From<sqlx::Error> for SessionRepositoryError {
    fn from(err: sqlx::Error) -> Self {
        SessionPgRepository::map_sqlx_error(err)
    }
}

pub struct SessionPgRepository {
    pool: Arc<PgPool>,
}

impl SessionPgRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn map_sqlx_error(err: sqlx::Error) -> SessionRepositoryError {
        match err {
            sqlx::Error::RowNotFound => SessionRepositoryError::NotFound("session not found".to_string()),
            other => SessionRepositoryError::DatabaseError(other.to_string()),
        }
    }

    fn row_to_session(row: sqlx::postgres::PgRow) -> Session {
        Session {
            id: row.get("id"),
            user_id: row.get("user_id"),
            refresh_token: row.get("refresh_token"),
            expires_at: row.get("expires_at"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            created_at: row.get("created_at"),
            revoked: row.get("revoked"),
        }
    }
}

#[async_trait]
impl SessionRepository for SessionPgRepository {
    async fn create_session(&self, session: Session) -> SessionRepositoryResult<Session> {
        let session_clone = session.clone();

        with_transaction(&self.pool, "create_session", |tx| {
            Box::pin(async move {
                sqlx::query(
                    r#"
                    INSERT INTO auth.sessions (
                        id, user_id, refresh_token, expires_at,
                        ip_address, user_agent, created_at, revoked
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(session_clone.id)
                .bind(session_clone.user_id)
                .bind(&session_clone.refresh_token)
                .bind(session_clone.expires_at)
                .bind(&session_clone.ip_address)
                .bind(&session_clone.user_agent)
                .bind(session_clone.created_at)
                .bind(session_clone.revoked)
                .execute(&mut **tx)
                .await
                .map_err(SessionPgRepository::map_sqlx_error)?;

                Ok(session_clone)
            }) as BoxFuture<'_, SessionRepositoryResult<Session>>
        })
        .await?;

        Ok(session)
    }

    async fn get_session_by_id(&self, id: &Uuid) -> SessionRepositoryResult<Session> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, refresh_token, expires_at, ip_address, user_agent, created_at, revoked
            FROM auth.sessions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(Self::row_to_session(row))
    }

    async fn get_session_by_refresh_token(&self, refresh_token: &str) -> SessionRepositoryResult<Session> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, refresh_token, expires_at, ip_address, user_agent, created_at, revoked
            FROM auth.sessions WHERE refresh_token = $1
            "#,
        )
        .bind(refresh_token)
        .fetch_one(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(Self::row_to_session(row))
    }

    async fn get_sessions_by_user_id(&self, user_id: &Uuid) -> SessionRepositoryResult<Vec<Session>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, refresh_token, expires_at, ip_address, user_agent, created_at, revoked
            FROM auth.sessions WHERE user_id = $1 ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(Self::map_sqlx_error)?;

        Ok(rows.into_iter().map(Self::row_to_session).collect())
    }

    async fn revoke_session(&self, session_id: &Uuid) -> SessionRepositoryResult<()> {
        let id = *session_id;

        with_transaction(&self.pool, "revoke_session", |tx| {
            Box::pin(async move {
                let result = sqlx::query(
                    r#"
                    UPDATE auth.sessions SET revoked = true WHERE id = $1
                    RETURNING user_id
                    "#,
                )
                .bind(id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(SessionPgRepository::map_sqlx_error)?;

                if let Some(row) = result {
                    let user_id: Uuid = row.try_get("user_id").unwrap_or_default();
                    tracing::info!("session {} for user {} revoked", id, user_id);
                }

                Ok(())
            }) as BoxFuture<'_, SessionRepositoryResult<()>>
        })
        .await
    }

    async fn revoke_all_user_sessions(&self, user_id: &Uuid) -> SessionRepositoryResult<u64> {
        let user_id = *user_id;

        with_transaction(&self.pool, "revoke_all_user_sessions", |tx| {
            Box::pin(async move {
                let result = sqlx::query(
                    r#"
                    UPDATE auth.sessions SET revoked = true
                    WHERE user_id = $1 AND revoked = false
                    "#,
                )
                .bind(user_id)
                .execute(&mut **tx)
                .await
                .map_err(SessionPgRepository::map_sqlx_error)?;

                let affected = result.rows_affected();
                if affected > 0 {
                    tracing::info!("revoked {} sessions for user {}", affected, user_id);
                }

                Ok(affected)
            }) as BoxFuture<'_, SessionRepositoryResult<u64>>
        })
        .await
    }

    async fn delete_expired_sessions(&self) -> SessionRepositoryResult<u64> {
        let now = Utc::now();

        let result = sqlx::query("DELETE FROM auth.sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(Self::map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

/// A genuine database failure must not collapse into `NotFound` — callers
/// such as `AuthApplicationService::logout` treat `NotFound` as "already
/// logged out, nothing to do" and must still see other errors propagate.
fn to_domain_error(err: SessionRepositoryError) -> DomainError {
    match err {
        SessionRepositoryError::NotFound(msg) => DomainError::not_found("Session", msg),
        SessionRepositoryError::DatabaseError(msg) => DomainError::unavailable("Session", msg),
    }
}

#[async_trait]
impl SessionStoragePort for SessionPgRepository {
    async fn create_session(&self, session: Session) -> Result<Session, DomainError> {
        SessionRepository::create_session(self, session)
            .await
            .map_err(to_domain_error)
    }

    async fn get_session_by_refresh_token(&self, refresh_token: &str) -> Result<Session, DomainError> {
        SessionRepository::get_session_by_refresh_token(self, refresh_token)
            .await
            .map_err(to_domain_error)
    }

    async fn revoke_session(&self, session_id: &Uuid) -> Result<(), DomainError> {
        SessionRepository::revoke_session(self, session_id)
            .await
            .map_err(to_domain_error)
    }

    async fn revoke_all_user_sessions(&self, user_id: &Uuid) -> Result<u64, DomainError> {
        SessionRepository::revoke_all_user_sessions(self, user_id)
            .await
            .map_err(to_domain_error)
    }
}
