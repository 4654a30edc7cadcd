/**
 * Authenticated principal and per-user storage quota accounting.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub quota_bytes: i64,
    pub used_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_room_for(&self, additional_bytes: i64) -> bool {
        self.used_bytes.saturating_add(additional_bytes) <= self.quota_bytes
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserQuota {
    pub quota_bytes: i64,
    pub used_bytes: i64,
}

impl UserQuota {
    pub fn has_room_for(&self, additional_bytes: i64) -> bool {
        self.used_bytes.saturating_add(additional_bytes) <= self.quota_bytes
    }
}
