/**
 * JWT issuance and verification for the bearer-token login flow. The
 * Method Engine never sees this module — it only consults the
 * `CurrentUser` the auth middleware attaches to the request, per spec's
 * "the core never inspects the token" boundary.
 */
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::errors::DomainError;
use crate::domain::entities::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct AuthService {
    jwt_secret: String,
    token_expiry_secs: i64,
    refresh_token_expiry_days: i64,
}

impl AuthService {
    pub fn new(jwt_secret: String, token_expiry_secs: i64, refresh_token_expiry_days: i64) -> Self {
        Self {
            jwt_secret,
            token_expiry_secs,
            refresh_token_expiry_days,
        }
    }

    pub fn token_expiry_secs(&self) -> i64 {
        self.token_expiry_secs
    }

    pub fn refresh_token_expiry_days(&self) -> i64 {
        self.refresh_token_expiry_days
    }

    pub fn generate_access_token(&self, user: &User) -> Result<String, DomainError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.token_expiry_secs)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| DomainError::internal_error("Auth", format!("failed to sign access token: {e}")))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, DomainError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| DomainError::access_denied("Auth", format!("invalid access token: {e}")))?;

        Ok(data.claims)
    }

    /// A refresh token is an opaque high-entropy string, not a JWT —
    /// it is only ever looked up by exact match against `SessionStoragePort`.
    pub fn generate_refresh_token(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        hex_encode(&bytes)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            password_hash: String::new(),
            quota_bytes: 1024,
            used_bytes: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_a_token() {
        let svc = AuthService::new("secret".to_string(), 3600, 30);
        let u = user();
        let token = svc.generate_access_token(&u).unwrap();
        let claims = svc.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn rejects_token_signed_with_different_secret() {
        let svc_a = AuthService::new("secret-a".to_string(), 3600, 30);
        let svc_b = AuthService::new("secret-b".to_string(), 3600, 30);
        let token = svc_a.generate_access_token(&user()).unwrap();
        assert!(svc_b.verify_access_token(&token).is_err());
    }

    #[test]
    fn refresh_tokens_are_unique() {
        let svc = AuthService::new("secret".to_string(), 3600, 30);
        assert_ne!(svc.generate_refresh_token(), svc.generate_refresh_token());
    }
}
