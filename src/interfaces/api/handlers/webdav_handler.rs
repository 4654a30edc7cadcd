/**
 * The Method Engine: one dispatch handler per spec's Design Notes ("a
 * single router function dispatching on method, not one handler per verb
 * registered separately") since axum's typed method routing has no
 * built-in `MethodFilter` variants for PROPFIND/PROPPATCH/MKCOL/COPY/
 * MOVE/LOCK/UNLOCK. `Router::any` matches every verb onto this one
 * handler, which matches on `Method` itself.
 *
 * Every mutating verb follows the same precondition order: auth (done by
 * the middleware before this handler ever runs) -> lock check -> quota
 * check (PUT only) -> overwrite precondition (COPY/MOVE only) -> mutate
 * -> storage-used accounting.
 */
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Extension, Path, Request, State};
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use uuid::Uuid;

use crate::application::adapters::if_header;
use crate::application::adapters::webdav_error::WebDavError;
use crate::application::adapters::webdav_xml::{PropFindEntry, WebDavXml};
use crate::application::ports::lock_ports::{LockConflict, LockManagerPort, LockRequest};
use crate::application::ports::object_store_port::{ObjectStat, ObjectStore, PutOutcome};
use crate::application::ports::quota_ports::QuotaService;
use crate::common::di::AppState;
use crate::domain::entities::lock::{LockDepth, LockOwner, LockToken};
use crate::domain::entities::path::NormalizedPath;
use crate::domain::repositories::property_repository::{PropertyRepository, PropertyUpdate};
use crate::interfaces::middleware::auth::CurrentUser;

pub fn webdav_routes() -> Router<Arc<AppState>> {
    Router::new().route("/webdav/{*path}", any(dispatch)).route("/webdav/", any(dispatch_root))
}

async fn dispatch_root(
    state: State<Arc<AppState>>,
    user: Extension<CurrentUser>,
    req: Request<Body>,
) -> Response {
    dispatch_inner(state, user, String::new(), req).await
}

async fn dispatch(
    state: State<Arc<AppState>>,
    user: Extension<CurrentUser>,
    Path(path): Path<String>,
    req: Request<Body>,
) -> Response {
    dispatch_inner(state, user, path, req).await
}

async fn dispatch_inner(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    raw_path: String,
    req: Request<Body>,
) -> Response {
    let method = req.method().clone();
    let headers = req.headers().clone();

    let path = match NormalizedPath::parse(&format!("/{raw_path}")) {
        Ok(p) => p,
        Err(msg) => return WebDavError::BadRequest(msg).into_response(),
    };

    let result = match propfind_like_method(&method) {
        "OPTIONS" => Ok(handle_options()),
        "GET" => handle_get(&state, user.id, &path).await,
        "HEAD" => handle_head(&state, user.id, &path).await,
        "PUT" => {
            let body = match read_body(req).await {
                Ok(b) => b,
                Err(e) => return e.into_response(),
            };
            handle_put(&state, user.id, &path, &headers, body).await
        }
        "DELETE" => handle_delete(&state, user.id, &path, &headers).await,
        "MKCOL" => handle_mkcol(&state, user.id, &path, &headers).await,
        "COPY" => handle_copy(&state, user.id, &path, &headers).await,
        "MOVE" => handle_move(&state, user.id, &path, &headers).await,
        "LOCK" => {
            let body = match read_body(req).await {
                Ok(b) => b,
                Err(e) => return e.into_response(),
            };
            handle_lock(&state, &user, &path, &headers, body).await
        }
        "UNLOCK" => handle_unlock(&state, &user, &path, &headers).await,
        "PROPFIND" => {
            let body = match read_body(req).await {
                Ok(b) => b,
                Err(e) => return e.into_response(),
            };
            handle_propfind(&state, user.id, &path, &headers, body).await
        }
        "PROPPATCH" => {
            let body = match read_body(req).await {
                Ok(b) => b,
                Err(e) => return e.into_response(),
            };
            handle_proppatch(&state, user.id, &path, &headers, body).await
        }
        _ => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };

    match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn propfind_like_method(method: &Method) -> &str {
    method.as_str()
}

async fn read_body(req: Request<Body>) -> Result<Bytes, WebDavError> {
    axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|e| WebDavError::BadRequest(format!("failed to read request body: {e}")))
}

fn href_for(path: &NormalizedPath) -> String {
    format!("/webdav{}", path.as_str())
}

// ---- header parsing -------------------------------------------------

fn parse_depth(headers: &HeaderMap) -> LockDepth {
    match headers.get("Depth").and_then(|v| v.to_str().ok()) {
        Some("0") => LockDepth::Zero,
        _ => LockDepth::Infinity,
    }
}

/// PROPFIND additionally distinguishes Depth 1 from infinity; the lock
/// model only ever cares about zero-vs-infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropfindDepth {
    Zero,
    One,
    Infinity,
}

fn parse_propfind_depth(headers: &HeaderMap) -> PropfindDepth {
    match headers.get("Depth").and_then(|v| v.to_str().ok()) {
        Some("0") => PropfindDepth::Zero,
        Some("1") => PropfindDepth::One,
        _ => PropfindDepth::Infinity,
    }
}

fn parse_overwrite(headers: &HeaderMap) -> bool {
    headers
        .get("Overwrite")
        .and_then(|v| v.to_str().ok())
        .map(|v| !v.eq_ignore_ascii_case("F"))
        .unwrap_or(true)
}

fn parse_destination(headers: &HeaderMap) -> Result<NormalizedPath, WebDavError> {
    let raw = headers
        .get("Destination")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| WebDavError::BadRequest("missing Destination header".to_string()))?;

    let path_part = match url::Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(_) => raw.to_string(),
    };
    let path_part = path_part.strip_prefix("/webdav").unwrap_or(&path_part);

    NormalizedPath::parse(path_part).map_err(WebDavError::BadRequest)
}

fn parse_timeout(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get("Timeout").and_then(|v| v.to_str().ok())?;
    raw.split(',').find_map(|entry| {
        let entry = entry.trim();
        entry.strip_prefix("Second-").and_then(|n| n.parse::<u64>().ok()).map(Duration::from_secs)
    })
}

fn submitted_tokens(headers: &HeaderMap) -> Result<Vec<LockToken>, WebDavError> {
    let raw = headers.get("If").and_then(|v| v.to_str().ok()).unwrap_or("");
    let tokens = if_header::extract_tokens(raw)
        .ok_or_else(|| WebDavError::BadRequest("malformed If header".to_string()))?;
    Ok(tokens.into_iter().filter_map(|t| LockToken::parse(&t)).collect())
}

fn lock_token_header(headers: &HeaderMap) -> Option<LockToken> {
    headers.get("Lock-Token").and_then(|v| v.to_str().ok()).and_then(LockToken::parse)
}

// ---- OPTIONS ----------------------------------------------------------

fn handle_options() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(HeaderName::from_static("dav"), "1, 2")
        .header(
            header::ALLOW,
            "OPTIONS, GET, HEAD, PUT, DELETE, PROPFIND, PROPPATCH, MKCOL, COPY, MOVE, LOCK, UNLOCK",
        )
        .header(HeaderName::from_static("ms-author-via"), "DAV")
        .body(Body::empty())
        .unwrap()
}

// ---- GET / HEAD ---------------------------------------------------------
// Reads are allowed even under a lock held by another owner (see
// SPEC_FULL.md Open Question: locks gate writes only).

async fn handle_get(state: &AppState, user_id: Uuid, path: &NormalizedPath) -> Result<Response, WebDavError> {
    if path.is_collection() {
        return Err(WebDavError::BadRequest("cannot GET a collection".to_string()));
    }
    let (stat, body) = state.object_store.get(user_id, path).await?;
    let stream = axum::body::Body::from_stream(body);
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, stat.content_type)
        .header(header::CONTENT_LENGTH, stat.size)
        .header(header::LAST_MODIFIED, stat.last_modified.to_rfc2822())
        .body(stream)
        .unwrap())
}

async fn handle_head(state: &AppState, user_id: Uuid, path: &NormalizedPath) -> Result<Response, WebDavError> {
    if path.is_collection() {
        return Err(WebDavError::BadRequest("cannot HEAD a collection".to_string()));
    }
    let stat = state.object_store.stat(user_id, path).await?;
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, stat.content_type)
        .header(header::CONTENT_LENGTH, stat.size)
        .header(header::LAST_MODIFIED, stat.last_modified.to_rfc2822())
        .body(Body::empty())
        .unwrap())
}

// ---- PUT ----------------------------------------------------------------

async fn handle_put(
    state: &AppState,
    user_id: Uuid,
    path: &NormalizedPath,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, WebDavError> {
    if path.is_collection() {
        return Err(WebDavError::Conflict("cannot PUT a collection".to_string()));
    }

    let tokens = submitted_tokens(headers)?;
    state
        .lock_manager
        .check_write_access(path, user_id, &tokens)
        .map_err(write_conflict_to_error(&tokens))?;

    let previous_size = state.object_store.stat(user_id, path).await.ok().map(|s| s.size).unwrap_or(0);
    let new_size = body.len() as u64;
    let delta = new_size as i64 - previous_size as i64;

    if !state.quota_service.has_room_for(user_id, delta).await? {
        return Err(WebDavError::QuotaExceeded);
    }

    // Most WebDAV clients send a real Content-Type, but some (older sync
    // clients, curl without -H) omit it entirely; fall back to a guess from
    // the file extension rather than always storing octet-stream.
    let guessed_content_type;
    let content_type = match headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(ct) => ct,
        None => {
            guessed_content_type = mime_guess::from_path(path.as_str())
                .first_raw()
                .unwrap_or("application/octet-stream");
            guessed_content_type
        }
    };

    let outcome = state.object_store.put(user_id, path, body, content_type).await?;
    state.quota_service.adjust_used(user_id, delta).await?;

    let status = match outcome {
        PutOutcome::Created => StatusCode::CREATED,
        PutOutcome::Overwritten => StatusCode::NO_CONTENT,
    };
    Ok(status.into_response())
}

// ---- DELETE ---------------------------------------------------------------

async fn handle_delete(
    state: &AppState,
    user_id: Uuid,
    path: &NormalizedPath,
    headers: &HeaderMap,
) -> Result<Response, WebDavError> {
    let tokens = submitted_tokens(headers)?;
    state
        .lock_manager
        .check_write_access(path, user_id, &tokens)
        .map_err(write_conflict_to_error(&tokens))?;

    if path.is_collection() {
        state.object_store.delete_folder(user_id, path).await?;
    } else {
        let size = state.object_store.stat(user_id, path).await.ok().map(|s| s.size);
        state.object_store.delete(user_id, path).await?;
        if let Some(size) = size {
            let _ = state.quota_service.adjust_used(user_id, -(size as i64)).await;
        }
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---- MKCOL ------------------------------------------------------------

async fn handle_mkcol(
    state: &AppState,
    user_id: Uuid,
    path: &NormalizedPath,
    headers: &HeaderMap,
) -> Result<Response, WebDavError> {
    let collection = path.as_collection();
    let parent = collection.parent().unwrap_or_else(NormalizedPath::root);

    if stat_or_infer(state, user_id, &parent).await.is_none() {
        return Err(WebDavError::Conflict("parent collection does not exist".to_string()));
    }
    if stat_or_infer(state, user_id, &collection).await.is_some() {
        return Err(WebDavError::Conflict("resource already exists".to_string()));
    }

    let tokens = submitted_tokens(headers)?;
    state
        .lock_manager
        .check_write_access(&parent, user_id, &tokens)
        .map_err(write_conflict_to_error(&tokens))?;

    state.object_store.create_folder(user_id, &collection).await?;
    Ok(StatusCode::CREATED.into_response())
}

// ---- COPY / MOVE --------------------------------------------------------

async fn handle_copy(
    state: &AppState,
    user_id: Uuid,
    path: &NormalizedPath,
    headers: &HeaderMap,
) -> Result<Response, WebDavError> {
    let dest = parse_destination(headers)?;
    let overwrite = parse_overwrite(headers);

    let dest_existed = stat_or_infer(state, user_id, &dest).await.is_some();
    if dest_existed && !overwrite {
        return Err(WebDavError::PreconditionFailed);
    }

    let tokens = submitted_tokens(headers)?;
    state
        .lock_manager
        .check_write_access(&dest, user_id, &tokens)
        .map_err(write_conflict_to_error(&tokens))?;

    state.object_store.copy(user_id, path, &dest).await?;

    let status = if dest_existed { StatusCode::NO_CONTENT } else { StatusCode::CREATED };
    Ok(status.into_response())
}

async fn handle_move(
    state: &AppState,
    user_id: Uuid,
    path: &NormalizedPath,
    headers: &HeaderMap,
) -> Result<Response, WebDavError> {
    let dest = parse_destination(headers)?;
    let overwrite = parse_overwrite(headers);

    let dest_existed = stat_or_infer(state, user_id, &dest).await.is_some();
    if dest_existed && !overwrite {
        return Err(WebDavError::PreconditionFailed);
    }

    let tokens = submitted_tokens(headers)?;
    state
        .lock_manager
        .check_write_access(path, user_id, &tokens)
        .map_err(write_conflict_to_error(&tokens))?;
    state
        .lock_manager
        .check_write_access(&dest, user_id, &tokens)
        .map_err(write_conflict_to_error(&tokens))?;

    state.object_store.mv(user_id, path, &dest).await?;

    let status = if dest_existed { StatusCode::NO_CONTENT } else { StatusCode::CREATED };
    Ok(status.into_response())
}

// ---- LOCK / UNLOCK --------------------------------------------------------

async fn handle_lock(
    state: &AppState,
    user: &CurrentUser,
    path: &NormalizedPath,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, WebDavError> {
    let tokens = submitted_tokens(headers)?;
    let timeout = parse_timeout(headers);

    if let Some(token) = tokens.first() {
        // Refresh mode: no body, an existing token via `If`.
        let existing = state.lock_manager.find_by_token(token).await.ok_or(WebDavError::PreconditionFailed)?;
        if existing.resource_path != *path {
            return Err(WebDavError::PreconditionFailed);
        }
        let refreshed = state.lock_manager.refresh_lock(token, timeout).await?;
        let xml = WebDavXml::generate_lock_response(&refreshed, &href_for(path)).map_err(xml_err)?;
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
            .header("Lock-Token", format!("<{}>", refreshed.token))
            .body(Body::from(xml))
            .unwrap());
    }

    let (kind, body_owner) = WebDavXml::parse_lockinfo(&body).map_err(xml_err)?;
    let owner = match body_owner {
        LockOwner::Opaque(text) if text.is_empty() => LockOwner::Principal(user.id),
        other => other,
    };

    let request = LockRequest {
        user_id: user.id,
        path: path.clone(),
        kind,
        depth: parse_depth(headers),
        owner,
        timeout,
    };

    let lock = state.lock_manager.create_lock(request).await.map_err(|LockConflict::LockedByOther(lock)| {
        WebDavError::LockedByOther { lock: Box::new(lock), tokens_submitted: false }
    })?;

    let xml = WebDavXml::generate_lock_response(&lock, &href_for(path)).map_err(xml_err)?;
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
        .header("Lock-Token", format!("<{}>", lock.token))
        .body(Body::from(xml))
        .unwrap())
}

async fn handle_unlock(
    state: &AppState,
    user: &CurrentUser,
    path: &NormalizedPath,
    headers: &HeaderMap,
) -> Result<Response, WebDavError> {
    let token = lock_token_header(headers).ok_or_else(|| WebDavError::BadRequest("missing Lock-Token header".to_string()))?;

    let lock = state.lock_manager.find_by_token(&token).await.ok_or(WebDavError::LockTokenStale)?;
    if lock.resource_path != *path {
        return Err(WebDavError::LockTokenMismatch);
    }
    if lock.user_id != user.id {
        return Err(WebDavError::LockOwnerMismatch);
    }

    state.lock_manager.remove_lock(&token).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---- PROPFIND / PROPPATCH -------------------------------------------------

async fn handle_propfind(
    state: &AppState,
    user_id: Uuid,
    path: &NormalizedPath,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, WebDavError> {
    let request = WebDavXml::parse_propfind(&body).map_err(xml_err)?;
    let depth = parse_propfind_depth(headers);

    let root_stat = stat_or_infer(state, user_id, path).await.ok_or(WebDavError::NotFound)?;

    let mut stats = vec![root_stat.clone()];
    if root_stat.is_collection && depth != PropfindDepth::Zero {
        let recursive = depth == PropfindDepth::Infinity;
        let entries = state.object_store.list(user_id, path, recursive).await?;
        for entry in entries {
            stats.push(ObjectStat {
                path: entry.path,
                size: entry.size,
                content_type: "application/octet-stream".to_string(),
                last_modified: entry.last_modified,
                created_at: entry.last_modified,
                is_collection: entry.is_collection,
            });
        }
    }

    let mut propfind_entries = Vec::with_capacity(stats.len());
    for stat in stats {
        let dead_properties = state.property_repository.get_all(user_id, &stat.path).await?;
        propfind_entries.push(PropFindEntry { href: href_for(&stat.path), stat, dead_properties });
    }

    let xml = WebDavXml::generate_propfind_response(&propfind_entries, &request).map_err(xml_err)?;
    Ok(Response::builder()
        .status(StatusCode::MULTI_STATUS)
        .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
        .body(Body::from(xml))
        .unwrap())
}

/// Live (`DAV:`) properties are read-only via PROPPATCH: rejected with 403
/// before ever reaching the property store, per spec scenario 4.
const LIVE_PROPERTY_NAMES: &[&str] = &[
    "displayname",
    "getcontentlength",
    "getcontenttype",
    "getlastmodified",
    "creationdate",
    "resourcetype",
    "getetag",
    "supportedlock",
    "lockdiscovery",
    "getcontentlanguage",
    "source",
];

async fn handle_proppatch(
    state: &AppState,
    user_id: Uuid,
    path: &NormalizedPath,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, WebDavError> {
    let tokens = submitted_tokens(headers)?;
    state
        .lock_manager
        .check_write_access(path, user_id, &tokens)
        .map_err(write_conflict_to_error(&tokens))?;

    let updates = WebDavXml::parse_proppatch(&body).map_err(xml_err)?;

    let mut storable = Vec::new();
    let mut statuses = Vec::new();
    for update in updates {
        let name = match &update {
            PropertyUpdate::Set { name, .. } | PropertyUpdate::Remove { name } => name.clone(),
        };
        if name.is_dav_namespace() && LIVE_PROPERTY_NAMES.contains(&name.name.as_str()) {
            statuses.push((name, 403u16));
        } else {
            storable.push(update);
        }
    }

    if !storable.is_empty() {
        let outcomes = state.property_repository.apply_updates(user_id, path, storable).await?;
        for outcome in outcomes {
            statuses.push((outcome.name, if outcome.result.is_ok() { 200 } else { 409 }));
        }
    }

    let xml = WebDavXml::generate_proppatch_response(&href_for(path), &statuses).map_err(xml_err)?;
    Ok(Response::builder()
        .status(StatusCode::MULTI_STATUS)
        .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
        .body(Body::from(xml))
        .unwrap())
}

// ---- shared helpers ---------------------------------------------------

async fn stat_or_infer(state: &AppState, user_id: Uuid, path: &NormalizedPath) -> Option<ObjectStat> {
    state.object_store.stat(user_id, path).await.ok()
}

fn xml_err(e: crate::application::adapters::webdav_xml::XmlError) -> WebDavError {
    WebDavError::BadRequest(e.to_string())
}

/// RFC 4918 distinguishes `lock-token-submitted` (caller presented a token,
/// but it didn't cover this lock) from `no-conflicting-lock` (no token was
/// presented at all).
fn write_conflict_to_error(tokens: &[LockToken]) -> impl Fn(LockConflict) -> WebDavError + '_ {
    move |LockConflict::LockedByOther(lock)| WebDavError::LockedByOther {
        lock: Box::new(lock),
        tokens_submitted: !tokens.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::auth_ports::{SessionStoragePort, UserStoragePort};
    use crate::application::services::auth_application_service::AuthApplicationService;
    use crate::application::services::lock_manager_service::LockManagerService;
    use crate::common::config::AppConfig;
    use crate::common::errors::DomainError;
    use crate::domain::entities::property::DeadProperty;
    use crate::domain::entities::session::Session;
    use crate::domain::entities::user::{User, UserQuota};
    use crate::domain::repositories::lock_repository::{LockRepository, LockRepositoryResult};
    use crate::domain::repositories::property_repository::{
        PropertyRepositoryResult, PropertyUpdateOutcome,
    };
    use crate::domain::services::auth_service::AuthService;
    use crate::infrastructure::services::memory_object_store::MemoryObjectStore;
    use axum::body::Body as AxumBody;
    use axum::http::Request as AxumRequest;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tower::ServiceExt;

    #[derive(Default)]
    struct NoopLockRepository;

    #[async_trait::async_trait]
    impl LockRepository for NoopLockRepository {
        async fn upsert(&self, _lock: &crate::domain::entities::lock::Lock) -> LockRepositoryResult<()> {
            Ok(())
        }
        async fn remove(&self, _token: &LockToken) -> LockRepositoryResult<()> {
            Ok(())
        }
        async fn remove_expired(&self, _now: chrono::DateTime<Utc>) -> LockRepositoryResult<u64> {
            Ok(0)
        }
        async fn load_all_active(
            &self,
            _now: chrono::DateTime<Utc>,
        ) -> LockRepositoryResult<Vec<crate::domain::entities::lock::Lock>> {
            Ok(Vec::new())
        }
        async fn load_by_path(
            &self,
            _user_id: Uuid,
            _path: &NormalizedPath,
        ) -> LockRepositoryResult<Vec<crate::domain::entities::lock::Lock>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct InMemoryPropertyRepository {
        rows: Mutex<HashMap<(Uuid, String, String, String), DeadProperty>>,
    }

    #[async_trait::async_trait]
    impl PropertyRepository for InMemoryPropertyRepository {
        async fn get_all(&self, user_id: Uuid, path: &NormalizedPath) -> PropertyRepositoryResult<Vec<DeadProperty>> {
            Ok(self
                .rows
                .lock()
                .values()
                .filter(|p| p.user_id == user_id && &p.path == path)
                .cloned()
                .collect())
        }

        async fn get_one(
            &self,
            user_id: Uuid,
            path: &NormalizedPath,
            name: &crate::domain::entities::property::PropertyName,
        ) -> PropertyRepositoryResult<Option<DeadProperty>> {
            let key = (user_id, path.as_str().to_string(), name.namespace.clone(), name.name.clone());
            Ok(self.rows.lock().get(&key).cloned())
        }

        async fn apply_updates(
            &self,
            user_id: Uuid,
            path: &NormalizedPath,
            updates: Vec<PropertyUpdate>,
        ) -> PropertyRepositoryResult<Vec<PropertyUpdateOutcome>> {
            let mut rows = self.rows.lock();
            let mut outcomes = Vec::with_capacity(updates.len());
            let now = Utc::now();
            for update in updates {
                match update {
                    PropertyUpdate::Set { name, value } => {
                        let key = (user_id, path.as_str().to_string(), name.namespace.clone(), name.name.clone());
                        rows.insert(
                            key,
                            DeadProperty {
                                user_id,
                                path: path.clone(),
                                name: name.clone(),
                                value,
                                is_live: false,
                                created_at: now,
                                updated_at: now,
                            },
                        );
                        outcomes.push(PropertyUpdateOutcome { name, result: Ok(()) });
                    }
                    PropertyUpdate::Remove { name } => {
                        let key = (user_id, path.as_str().to_string(), name.namespace.clone(), name.name.clone());
                        rows.remove(&key);
                        outcomes.push(PropertyUpdateOutcome { name, result: Ok(()) });
                    }
                }
            }
            Ok(outcomes)
        }
    }

    #[derive(Default)]
    struct InMemoryQuotaService {
        used: Mutex<HashMap<Uuid, i64>>,
    }

    const TEST_QUOTA_BYTES: i64 = 1024 * 1024 * 1024;

    #[async_trait::async_trait]
    impl QuotaService for InMemoryQuotaService {
        async fn get_quota(&self, user_id: Uuid) -> Result<UserQuota, DomainError> {
            let used = *self.used.lock().get(&user_id).unwrap_or(&0);
            Ok(UserQuota { quota_bytes: TEST_QUOTA_BYTES, used_bytes: used })
        }

        async fn adjust_used(&self, user_id: Uuid, delta: i64) -> Result<(), DomainError> {
            let mut used = self.used.lock();
            let entry = used.entry(user_id).or_insert(0);
            *entry = (*entry + delta).max(0);
            Ok(())
        }
    }

    struct UnusedUserStorage;

    #[async_trait::async_trait]
    impl UserStoragePort for UnusedUserStorage {
        async fn create_user(&self, _username: &str, _password_hash: &str, _quota_bytes: i64) -> Result<User, DomainError> {
            Err(DomainError::not_found("User", "unused in these tests"))
        }
        async fn get_user_by_id(&self, _id: &Uuid) -> Result<User, DomainError> {
            Err(DomainError::not_found("User", "unused in these tests"))
        }
        async fn get_user_by_username(&self, _username: &str) -> Result<User, DomainError> {
            Err(DomainError::not_found("User", "unused in these tests"))
        }
        async fn get_quota(&self, _user_id: &Uuid) -> Result<UserQuota, DomainError> {
            Err(DomainError::not_found("User", "unused in these tests"))
        }
        async fn adjust_used_bytes(&self, _user_id: &Uuid, _delta: i64) -> Result<(), DomainError> {
            Ok(())
        }
    }

    struct UnusedSessionStorage;

    #[async_trait::async_trait]
    impl SessionStoragePort for UnusedSessionStorage {
        async fn create_session(&self, session: Session) -> Result<Session, DomainError> {
            Ok(session)
        }
        async fn get_session_by_refresh_token(&self, _refresh_token: &str) -> Result<Session, DomainError> {
            Err(DomainError::not_found("Session", "unused in these tests"))
        }
        async fn revoke_session(&self, _session_id: &Uuid) -> Result<(), DomainError> {
            Ok(())
        }
        async fn revoke_all_user_sessions(&self, _user_id: &Uuid) -> Result<u64, DomainError> {
            Ok(0)
        }
    }

    fn test_state() -> Arc<AppState> {
        let object_store = Arc::new(MemoryObjectStore::new());
        let lock_manager = Arc::new(LockManagerService::new(Arc::new(NoopLockRepository), 86400));
        let property_repository: Arc<dyn PropertyRepository> = Arc::new(InMemoryPropertyRepository::default());
        let quota_service: Arc<dyn QuotaService> = Arc::new(InMemoryQuotaService::default());
        let user_storage: Arc<dyn UserStoragePort> = Arc::new(UnusedUserStorage);
        let session_storage: Arc<dyn SessionStoragePort> = Arc::new(UnusedSessionStorage);
        let auth_service = Arc::new(AuthService::new("test-secret".to_string(), 3600, 30));
        let auth_application_service = Arc::new(AuthApplicationService::new(
            user_storage.clone(),
            session_storage.clone(),
            auth_service.clone(),
        ));

        Arc::new(AppState {
            config: AppConfig::default(),
            object_store,
            lock_manager,
            property_repository,
            quota_service,
            user_storage,
            session_storage,
            auth_service,
            auth_application_service,
        })
    }

    /// A router carrying a fixed `CurrentUser` extension, standing in for
    /// the real bearer-auth middleware (exercised separately in
    /// `interfaces::middleware::auth`). Each simulated user gets its own
    /// router instance over the same shared `AppState`.
    fn app_for(state: Arc<AppState>, user_id: Uuid) -> Router {
        webdav_routes()
            .with_state(state)
            .layer(Extension(CurrentUser { id: user_id, username: "tester".to_string() }))
    }

    async fn send(app: &Router, req: AxumRequest<AxumBody>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    fn req(method: &str, path: &str, body: &'static str) -> AxumRequest<AxumBody> {
        AxumRequest::builder()
            .method(method)
            .uri(format!("/webdav{path}"))
            .body(AxumBody::from(body))
            .unwrap()
    }

    fn header_req(method: &str, path: &str, headers: &[(&str, &str)], body: &'static str) -> AxumRequest<AxumBody> {
        let mut builder = AxumRequest::builder().method(method).uri(format!("/webdav{path}"));
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(AxumBody::from(body)).unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        resp.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let state = test_state();
        let app = app_for(state, Uuid::new_v4());

        let put_resp = send(&app, req("PUT", "/a.txt", "hello")).await;
        assert_eq!(put_resp.status(), StatusCode::CREATED);

        let get_resp = send(&app, req("GET", "/a.txt", "")).await;
        assert_eq!(get_resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(get_resp).await, b"hello");

        // Overwrite is 204, per RFC 4918 9.7, not 201 again.
        let overwrite_resp = send(&app, req("PUT", "/a.txt", "bye")).await;
        assert_eq!(overwrite_resp.status(), StatusCode::NO_CONTENT);
    }

    /// Scenario 1 (spec 8): lock, conflicting lock from another user,
    /// unlock, then the other user's lock succeeds.
    #[tokio::test]
    async fn lock_conflict_then_unlock_allows_other_user() {
        let state = test_state();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let app1 = app_for(state.clone(), u1);
        let app2 = app_for(state.clone(), u2);

        let lockinfo = r#"<d:lockinfo xmlns:d="DAV:"><d:lockscope><d:exclusive/></d:lockscope><d:locktype><d:write/></d:locktype></d:lockinfo>"#;

        let lock1 = send(&app1, header_req("LOCK", "/a.txt", &[("Timeout", "Second-3600"), ("Depth", "0")], lockinfo)).await;
        assert_eq!(lock1.status(), StatusCode::OK);
        let token = lock1.headers().get("Lock-Token").unwrap().to_str().unwrap().to_string();

        let lock2 = send(&app2, header_req("LOCK", "/a.txt", &[("Timeout", "Second-3600"), ("Depth", "0")], lockinfo)).await;
        assert_eq!(lock2.status(), StatusCode::LOCKED);
        let body = String::from_utf8(body_bytes(lock2).await).unwrap();
        assert!(body.contains("no-conflicting-lock"));

        let unlock = send(&app1, header_req("UNLOCK", "/a.txt", &[("Lock-Token", token.as_str())], "")).await;
        assert_eq!(unlock.status(), StatusCode::NO_CONTENT);

        let lock3 = send(&app2, header_req("LOCK", "/a.txt", &[("Timeout", "Second-3600"), ("Depth", "0")], lockinfo)).await;
        assert_eq!(lock3.status(), StatusCode::OK);
    }

    /// Scenario 2 (spec 8): a depth-infinity lock on a collection blocks
    /// writes to descendants by other users, but not by the lock holder.
    #[tokio::test]
    async fn depth_infinity_lock_blocks_descendant_write_by_other_user() {
        let state = test_state();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let app1 = app_for(state.clone(), u1);
        let app2 = app_for(state.clone(), u2);

        let lockinfo = r#"<d:lockinfo xmlns:d="DAV:"><d:lockscope><d:exclusive/></d:lockscope><d:locktype><d:write/></d:locktype></d:lockinfo>"#;
        let lock1 = send(&app1, header_req("LOCK", "/dir/", &[("Timeout", "Second-3600"), ("Depth", "infinity")], lockinfo)).await;
        assert_eq!(lock1.status(), StatusCode::OK);

        let other_put = send(&app2, req("PUT", "/dir/child.txt", "x")).await;
        assert_eq!(other_put.status(), StatusCode::LOCKED);

        let owner_put = send(&app1, req("PUT", "/dir/child.txt", "x")).await;
        assert_eq!(owner_put.status(), StatusCode::CREATED);
    }

    /// Scenario 3 (spec 8): PROPPATCH sets a dead property, PROPFIND
    /// returns it under its declaring namespace.
    #[tokio::test]
    async fn proppatch_then_propfind_round_trips_dead_property() {
        let state = test_state();
        let app = app_for(state, Uuid::new_v4());

        let put_resp = send(&app, req("PUT", "/doc.txt", "content")).await;
        assert_eq!(put_resp.status(), StatusCode::CREATED);

        let proppatch_body =
            r#"<d:propertyupdate xmlns:d="DAV:"><d:set><d:prop><x:tag xmlns:x="urn:test">v1</x:tag></d:prop></d:set></d:propertyupdate>"#;
        let proppatch_resp = send(&app, req("PROPPATCH", "/doc.txt", proppatch_body)).await;
        assert_eq!(proppatch_resp.status(), StatusCode::MULTI_STATUS);
        let proppatch_xml = String::from_utf8(body_bytes(proppatch_resp).await).unwrap();
        assert!(proppatch_xml.contains("HTTP/1.1 200 OK"));

        let propfind_resp = send(&app, header_req("PROPFIND", "/doc.txt", &[("Depth", "0")], "")).await;
        assert_eq!(propfind_resp.status(), StatusCode::MULTI_STATUS);
        let propfind_xml = String::from_utf8(body_bytes(propfind_resp).await).unwrap();
        assert!(propfind_xml.contains("v1"));
    }

    /// Scenario 4 (spec 8): PROPPATCH rejects a live `DAV:` property.
    #[tokio::test]
    async fn proppatch_rejects_live_property() {
        let state = test_state();
        let app = app_for(state, Uuid::new_v4());
        send(&app, req("PUT", "/doc.txt", "content")).await;

        let body = r#"<d:propertyupdate xmlns:d="DAV:"><d:set><d:prop><d:displayname>nope</d:displayname></d:prop></d:set></d:propertyupdate>"#;
        let resp = send(&app, req("PROPPATCH", "/doc.txt", body)).await;
        assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
        let xml = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(xml.contains("403"));
    }

    /// Scenario 5 (spec 8): MOVE with `Overwrite: F` onto an existing
    /// destination is rejected and leaves both resources untouched.
    #[tokio::test]
    async fn move_with_overwrite_false_onto_existing_destination_is_rejected() {
        let state = test_state();
        let app = app_for(state, Uuid::new_v4());
        send(&app, req("PUT", "/src.txt", "source")).await;
        send(&app, req("PUT", "/dst.txt", "dest")).await;

        let resp = send(
            &app,
            header_req("MOVE", "/src.txt", &[("Destination", "/webdav/dst.txt"), ("Overwrite", "F")], ""),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

        let src_resp = send(&app, req("GET", "/src.txt", "")).await;
        assert_eq!(src_resp.status(), StatusCode::OK);
        let dst_resp = send(&app, req("GET", "/dst.txt", "")).await;
        assert_eq!(body_bytes(dst_resp).await, b"dest");
    }

    /// Scenario 6 (spec 8): a lock with a short timeout expires, releasing
    /// the resource for another user's write.
    #[tokio::test]
    async fn lock_expires_and_releases_resource() {
        let state = test_state();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let app1 = app_for(state.clone(), u1);
        let app2 = app_for(state.clone(), u2);

        let lockinfo = r#"<d:lockinfo xmlns:d="DAV:"><d:lockscope><d:exclusive/></d:lockscope><d:locktype><d:write/></d:locktype></d:lockinfo>"#;
        let lock_resp = send(&app1, header_req("LOCK", "/a.txt", &[("Timeout", "Second-1")], lockinfo)).await;
        assert_eq!(lock_resp.status(), StatusCode::OK);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let put_resp = send(&app2, req("PUT", "/a.txt", "x")).await;
        assert_eq!(put_resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn mkcol_conflicts_when_parent_missing() {
        let state = test_state();
        let app = app_for(state, Uuid::new_v4());
        let resp = send(&app, req("MKCOL", "/missing-parent/child/", "")).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    /// spec.md §4.1/§3: `MKCOL` must write a real marker so an *empty*
    /// collection persists — a following `PROPFIND` must see it instead of
    /// 404ing, and a nested `MKCOL` under it must not 409 on a
    /// falsely-missing parent.
    #[tokio::test]
    async fn mkcol_persists_empty_collection_and_allows_nested_mkcol() {
        let state = test_state();
        let app = app_for(state, Uuid::new_v4());

        let resp = send(&app, req("MKCOL", "/a/", "")).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let propfind_resp = send(&app, header_req("PROPFIND", "/a/", &[("Depth", "0")], "")).await;
        assert_eq!(propfind_resp.status(), StatusCode::MULTI_STATUS);

        let nested_resp = send(&app, req("MKCOL", "/a/b/", "")).await;
        assert_eq!(nested_resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn unlock_without_token_header_is_bad_request() {
        let state = test_state();
        let app = app_for(state, Uuid::new_v4());
        send(&app, req("PUT", "/a.txt", "x")).await;
        let resp = send(&app, req("UNLOCK", "/a.txt", "")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn options_advertises_dav_classes_and_verbs() {
        let state = test_state();
        let app = app_for(state, Uuid::new_v4());
        let resp = send(&app, req("OPTIONS", "/", "")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("dav").unwrap(), "1, 2");
        let allow = resp.headers().get(header::ALLOW).unwrap().to_str().unwrap();
        assert!(allow.contains("PROPFIND"));
        assert!(allow.contains("LOCK"));
    }

    /// spec.md §4.4 LOCK: an empty request body in new-lock mode (no `If`
    /// header) defaults to exclusive/write rather than 400ing.
    #[tokio::test]
    async fn lock_with_empty_body_defaults_to_exclusive() {
        let state = test_state();
        let app = app_for(state, Uuid::new_v4());

        let resp = send(&app, header_req("LOCK", "/a.txt", &[("Timeout", "Second-3600")], "")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let xml = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(xml.contains("d:exclusive"));
    }
}
