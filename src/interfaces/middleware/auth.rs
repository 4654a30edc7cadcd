/**
 * Bearer-token authentication. Every WebDAV route requires a valid access
 * token; `/auth/login` is mounted outside this middleware's scope in
 * `main.rs`'s router so a client can obtain one in the first place.
 */
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::common::di::AppState;

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

pub async fn require_bearer_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = state
        .auth_service
        .verify_access_token(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // Memoized per process by the object store itself; cheap after the
    // first request for a given user.
    state
        .object_store
        .ensure_bucket(claims.sub)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    request.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        username: claims.username,
    });

    Ok(next.run(request).await)
}
