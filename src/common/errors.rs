/**
 * Domain error types shared across the application, infrastructure and
 * interfaces layers.
 *
 * `DomainError` is the error currency for everything below the HTTP
 * boundary: repositories, application services and the auth/quota glue.
 * The WebDAV-specific `WebDavError` (see
 * `application::adapters::webdav_error`) sits above it and knows how to
 * turn a `DomainError` into an RFC 4918 status code.
 */
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidInput,
    AccessDenied,
    InternalError,
    Unavailable,
}

#[derive(Debug, Error, Clone)]
#[error("{entity}: {message}")]
pub struct DomainError {
    pub kind: ErrorKind,
    pub entity: String,
    pub message: String,
}

impl DomainError {
    pub fn new(kind: ErrorKind, entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, entity, format!("not found: {}", id.into()))
    }

    pub fn already_exists(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, entity, format!("already exists: {}", id.into()))
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, "Validation", message)
    }

    pub fn access_denied(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, entity, message)
    }

    pub fn internal_error(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, entity, message)
    }

    pub fn unavailable(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, entity, message)
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::not_found("Row", "unknown"),
            other => DomainError::unavailable("Database", other.to_string()),
        }
    }
}
