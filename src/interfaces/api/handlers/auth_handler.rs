/**
 * The one unauthenticated route: trading a username/password for a
 * bearer access token the WebDAV routes' auth middleware will accept.
 */
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use crate::application::dtos::auth_dto::{LoginRequestDto, LogoutRequestDto};
use crate::common::di::AppState;
use crate::common::errors::ErrorKind;

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(handle_login))
        .route("/auth/logout", post(handle_logout))
}

async fn handle_login(State(state): State<Arc<AppState>>, Json(request): Json<LoginRequestDto>) -> Response {
    match state.auth_application_service.login(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) if e.kind == ErrorKind::AccessDenied => StatusCode::UNAUTHORIZED.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Revoking a refresh token is idempotent: an unknown or already-revoked
/// token still reports success, since the caller's goal (no longer being
/// logged in) is already satisfied.
async fn handle_logout(State(state): State<Arc<AppState>>, Json(request): Json<LogoutRequestDto>) -> Response {
    match state.auth_application_service.logout(&request.refresh_token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
