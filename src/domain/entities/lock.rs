/**
 * RFC 4918 §6 lock state: tokens, scope, depth and ownership.
 */
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use super::path::NormalizedPath;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn new() -> Self {
        Self(format!("opaquelocktoken:{}", Uuid::new_v4()))
    }

    /// Parses a token out of an `Opaquelocktoken` header value or an `If`
    /// header's `<...>` coded list entry. Accepts both the bare
    /// `opaquelocktoken:<uuid>` form and one wrapped in angle brackets.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_start_matches('<').trim_end_matches('>');
        if trimmed.starts_with("opaquelocktoken:") {
            Some(Self(trimmed.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LockToken {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Exclusive,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDepth {
    Zero,
    Infinity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOwner {
    /// The authenticated principal that created the lock.
    Principal(Uuid),
    /// The verbatim `<D:owner>` XML blob from the LOCK request body, when
    /// the client supplied one instead of (or alongside) its identity.
    Opaque(String),
}

#[derive(Debug, Clone)]
pub struct Lock {
    pub token: LockToken,
    pub user_id: Uuid,
    pub kind: LockKind,
    pub owner: LockOwner,
    pub resource_path: NormalizedPath,
    pub depth: LockDepth,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub timeout_seconds: i64,
}

impl Lock {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn refreshed(&self, now: DateTime<Utc>, timeout_seconds: i64) -> Self {
        Self {
            expires_at: now + chrono::Duration::seconds(timeout_seconds),
            timeout_seconds,
            ..self.clone()
        }
    }
}
