/**
 * Wire DTOs for the login endpoint. Thin on purpose — the core WebDAV
 * modules never see these, only the `CurrentUser` the auth middleware
 * derives from the resulting access token.
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LoginRequestDto {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseDto {
    pub user_id: Uuid,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequestDto {
    pub refresh_token: String,
}
