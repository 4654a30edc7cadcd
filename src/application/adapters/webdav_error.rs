/**
 * Single sum-typed error for the Method Engine, replacing the sentinel-
 * string/ad-hoc-struct error pattern the spec's Design Notes call out.
 * `into_response` is the one place that maps the taxonomy onto RFC 4918
 * status codes and, where the protocol calls for it, an `<d:error>` body.
 */
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::application::adapters::webdav_xml::WebDavXml;
use crate::application::ports::object_store_port::ObjectStoreError;
use crate::common::errors::{DomainError, ErrorKind};
use crate::domain::entities::lock::Lock;

#[derive(Debug, Error)]
pub enum WebDavError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("resource not found")]
    NotFound,
    /// A write was blocked by someone else's lock. `tokens_submitted`
    /// distinguishes the two RFC 4918 error conditions: the caller
    /// presented an `If` token that didn't cover this lock
    /// (`lock-token-submitted`) versus presenting none at all
    /// (`no-conflicting-lock`).
    #[error("locked by another owner")]
    LockedByOther { lock: Box<Lock>, tokens_submitted: bool },
    #[error("lock token does not match the request URI")]
    LockTokenMismatch,
    #[error("lock token is unknown or expired")]
    LockTokenStale,
    #[error("lock owner mismatch")]
    LockOwnerMismatch,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl WebDavError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::LockedByOther { .. } => StatusCode::LOCKED,
            Self::LockTokenMismatch => StatusCode::CONFLICT,
            Self::LockTokenStale => StatusCode::CONFLICT,
            Self::LockOwnerMismatch => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            Self::QuotaExceeded => StatusCode::INSUFFICIENT_STORAGE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_body(&self) -> Option<Vec<u8>> {
        match self {
            Self::LockedByOther { tokens_submitted: true, .. } => {
                Some(WebDavXml::generate_error_body("lock-token-submitted"))
            }
            Self::LockedByOther { tokens_submitted: false, .. } => {
                Some(WebDavXml::generate_error_body("no-conflicting-lock"))
            }
            Self::LockTokenMismatch => Some(WebDavXml::generate_error_body("lock-token-matches-request-uri")),
            _ => None,
        }
    }
}

impl IntoResponse for WebDavError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.error_body() {
            Some(xml) => (status, [(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml).into_response(),
            None => status.into_response(),
        }
    }
}

impl From<ObjectStoreError> for WebDavError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound => Self::NotFound,
            ObjectStoreError::AlreadyExists => Self::Conflict("resource already exists".to_string()),
            ObjectStoreError::BackendUnavailable(msg) => Self::BackendUnavailable(msg),
            ObjectStoreError::Other(msg) => Self::BackendUnavailable(msg),
        }
    }
}

impl From<DomainError> for WebDavError {
    fn from(err: DomainError) -> Self {
        match err.kind {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::AlreadyExists => Self::Conflict(err.message),
            ErrorKind::InvalidInput => Self::BadRequest(err.message),
            ErrorKind::AccessDenied => Self::Unauthorized,
            ErrorKind::Unavailable => Self::BackendUnavailable(err.message),
            ErrorKind::InternalError => Self::BackendUnavailable(err.message),
        }
    }
}
