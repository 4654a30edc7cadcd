/**
 * Dead (and recorded-live) WebDAV properties, keyed per resource.
 */
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::path::NormalizedPath;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyName {
    pub namespace: String,
    pub name: String,
}

impl PropertyName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// `DAV:` is the namespace reserved for live properties; the Method
    /// Engine rejects PROPPATCH attempts to set or remove a property in
    /// this namespace before it ever reaches the store.
    pub fn is_dav_namespace(&self) -> bool {
        self.namespace == "DAV:"
    }
}

#[derive(Debug, Clone)]
pub struct DeadProperty {
    pub user_id: Uuid,
    pub path: NormalizedPath,
    pub name: PropertyName,
    pub value: String,
    pub is_live: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
