/**
 * Login/session issuance. The gateway has no self-service registration
 * surface (accounts and their S3 bucket are provisioned out of band); this
 * service only ever verifies a password and mints tokens.
 */
use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::application::dtos::auth_dto::{LoginRequestDto, LoginResponseDto};
use crate::application::ports::auth_ports::{SessionStoragePort, UserStoragePort};
use crate::common::errors::{DomainError, ErrorKind};
use crate::domain::entities::session::Session;
use crate::domain::services::auth_service::AuthService;

pub struct AuthApplicationService {
    user_storage: Arc<dyn UserStoragePort>,
    session_storage: Arc<dyn SessionStoragePort>,
    auth_service: Arc<AuthService>,
}

impl AuthApplicationService {
    pub fn new(
        user_storage: Arc<dyn UserStoragePort>,
        session_storage: Arc<dyn SessionStoragePort>,
        auth_service: Arc<AuthService>,
    ) -> Self {
        Self {
            user_storage,
            session_storage,
            auth_service,
        }
    }

    pub async fn login(&self, request: LoginRequestDto) -> Result<LoginResponseDto, DomainError> {
        let user = self
            .user_storage
            .get_user_by_username(&request.username)
            .await
            .map_err(|_| DomainError::access_denied("Auth", "invalid credentials"))?;

        let hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| DomainError::internal_error("Auth", format!("stored password hash is malformed: {e}")))?;
        Argon2::default()
            .verify_password(request.password.as_bytes(), &hash)
            .map_err(|_| DomainError::access_denied("Auth", "invalid credentials"))?;

        let access_token = self.auth_service.generate_access_token(&user)?;
        let refresh_token = self.auth_service.generate_refresh_token();

        let session = Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            refresh_token: refresh_token.clone(),
            expires_at: Utc::now() + Duration::days(self.auth_service.refresh_token_expiry_days()),
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
            revoked: false,
        };
        self.session_storage.create_session(session).await?;

        Ok(LoginResponseDto {
            user_id: user.id,
            username: user.username,
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.auth_service.token_expiry_secs(),
        })
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), DomainError> {
        match self.session_storage.get_session_by_refresh_token(refresh_token).await {
            Ok(session) => self.session_storage.revoke_session(&session.id).await,
            Err(e) if e.kind == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::domain::entities::user::User;

    struct FakeUserStorage;

    #[async_trait]
    impl UserStoragePort for FakeUserStorage {
        async fn create_user(&self, _username: &str, _password_hash: &str, _quota_bytes: i64) -> Result<User, DomainError> {
            unimplemented!()
        }
        async fn get_user_by_id(&self, _id: &Uuid) -> Result<User, DomainError> {
            unimplemented!()
        }
        async fn get_user_by_username(&self, _username: &str) -> Result<User, DomainError> {
            unimplemented!()
        }
        async fn get_quota(&self, _user_id: &Uuid) -> Result<crate::domain::entities::user::UserQuota, DomainError> {
            unimplemented!()
        }
        async fn adjust_used_bytes(&self, _user_id: &Uuid, _delta: i64) -> Result<(), DomainError> {
            unimplemented!()
        }
    }

    /// Returns whatever `lookup_result` holds for every refresh-token lookup,
    /// and records whether `revoke_session` was ever called.
    struct FakeSessionStorage {
        lookup_result: Result<Session, DomainError>,
        revoked: Mutex<bool>,
    }

    #[async_trait]
    impl SessionStoragePort for FakeSessionStorage {
        async fn create_session(&self, session: Session) -> Result<Session, DomainError> {
            Ok(session)
        }
        async fn get_session_by_refresh_token(&self, _refresh_token: &str) -> Result<Session, DomainError> {
            self.lookup_result.clone()
        }
        async fn revoke_session(&self, _session_id: &Uuid) -> Result<(), DomainError> {
            *self.revoked.lock().unwrap() = true;
            Ok(())
        }
        async fn revoke_all_user_sessions(&self, _user_id: &Uuid) -> Result<u64, DomainError> {
            unimplemented!()
        }
    }

    fn service(lookup_result: Result<Session, DomainError>) -> (AuthApplicationService, Arc<FakeSessionStorage>) {
        let sessions = Arc::new(FakeSessionStorage {
            lookup_result,
            revoked: Mutex::new(false),
        });
        let auth_service = Arc::new(AuthService::new("secret".to_string(), 3600, 30));
        let svc = AuthApplicationService::new(Arc::new(FakeUserStorage), sessions.clone(), auth_service);
        (svc, sessions)
    }

    /// Logging out with a refresh token nobody recognizes (already logged
    /// out, expired cleanup, forged token) succeeds — the caller's desired
    /// end state already holds.
    #[tokio::test]
    async fn logout_with_unknown_token_is_a_no_op_success() {
        let (svc, sessions) = service(Err(DomainError::not_found("Session", "refresh-token")));
        assert!(svc.logout("whatever").await.is_ok());
        assert!(!*sessions.revoked.lock().unwrap());
    }

    /// A real backend failure while looking up the session must not be
    /// swallowed as if the token were merely unknown.
    #[tokio::test]
    async fn logout_propagates_genuine_backend_errors() {
        let (svc, _sessions) = service(Err(DomainError::unavailable("Session", "connection reset")));
        let err = svc.logout("whatever").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn logout_revokes_a_known_session() {
        let session = Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            refresh_token: "tok".to_string(),
            expires_at: Utc::now() + Duration::days(1),
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
            revoked: false,
        };
        let (svc, sessions) = service(Ok(session));
        assert!(svc.logout("tok").await.is_ok());
        assert!(*sessions.revoked.lock().unwrap());
    }
}
