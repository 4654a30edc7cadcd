/**
 * In-process `ObjectStore` fake. Backs Method Engine unit tests without a
 * real S3-compatible backend; mirrors the collection-inference rules
 * `S3ObjectStore` implements against a real bucket (a collection is
 * whatever has a descendant key under its prefix, never stored itself).
 */
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::HashSet;
use uuid::Uuid;

use crate::application::ports::object_store_port::{
    ObjectBody, ObjectEntry, ObjectStat, ObjectStore, ObjectStoreError, PutOutcome,
};
use crate::domain::entities::path::NormalizedPath;

#[derive(Clone)]
struct StoredObject {
    body: Bytes,
    stat: ObjectStat,
}

pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(Uuid, String), StoredObject>>,
    buckets: Mutex<HashSet<Uuid>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            buckets: Mutex::new(HashSet::new()),
        }
    }

    fn key(user_id: Uuid, path: &NormalizedPath) -> (Uuid, String) {
        (user_id, path.as_str().to_string())
    }

    fn has_descendant(&self, user_id: Uuid, prefix: &NormalizedPath) -> bool {
        let objects = self.objects.lock();
        objects
            .keys()
            .any(|(uid, path)| *uid == user_id && path.starts_with(prefix.as_str()) && path != prefix.as_str())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_bucket(&self, user_id: Uuid) -> Result<(), ObjectStoreError> {
        self.buckets.lock().insert(user_id);
        Ok(())
    }

    async fn stat(&self, user_id: Uuid, path: &NormalizedPath) -> Result<ObjectStat, ObjectStoreError> {
        if let Some(obj) = self.objects.lock().get(&Self::key(user_id, path)) {
            return Ok(obj.stat.clone());
        }
        if path.is_collection() && (path.is_root() || self.has_descendant(user_id, path)) {
            return Ok(ObjectStat {
                path: path.clone(),
                size: 0,
                content_type: "application/x-directory".to_string(),
                last_modified: Utc::now(),
                created_at: Utc::now(),
                is_collection: true,
            });
        }
        Err(ObjectStoreError::NotFound)
    }

    async fn get(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(ObjectStat, ObjectBody), ObjectStoreError> {
        let obj = self
            .objects
            .lock()
            .get(&Self::key(user_id, path))
            .cloned()
            .ok_or(ObjectStoreError::NotFound)?;
        let body: ObjectBody = Box::pin(stream::once(async move { Ok(obj.body.clone()) }));
        Ok((obj.stat, body))
    }

    async fn put(
        &self,
        user_id: Uuid,
        path: &NormalizedPath,
        body: Bytes,
        content_type: &str,
    ) -> Result<PutOutcome, ObjectStoreError> {
        let key = Self::key(user_id, path);
        let now = Utc::now();
        let mut objects = self.objects.lock();
        let outcome = if objects.contains_key(&key) {
            PutOutcome::Overwritten
        } else {
            PutOutcome::Created
        };
        let created_at = objects.get(&key).map(|o| o.stat.created_at).unwrap_or(now);
        objects.insert(
            key,
            StoredObject {
                stat: ObjectStat {
                    path: path.clone(),
                    size: body.len() as u64,
                    content_type: content_type.to_string(),
                    last_modified: now,
                    created_at,
                    is_collection: false,
                },
                body,
            },
        );
        Ok(outcome)
    }

    async fn delete(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .remove(&Self::key(user_id, path))
            .map(|_| ())
            .ok_or(ObjectStoreError::NotFound)
    }

    async fn list(
        &self,
        user_id: Uuid,
        prefix: &NormalizedPath,
        recursive: bool,
    ) -> Result<Vec<ObjectEntry>, ObjectStoreError> {
        let objects = self.objects.lock();
        if recursive {
            // Depth-infinity PROPFIND needs a `d:response` for every
            // intermediate collection too, not just leaf files: synthesize
            // one entry per unique ancestor directory any matching key implies.
            let mut entries = Vec::new();
            let mut seen_dirs = HashSet::new();
            for ((uid, path), obj) in objects.iter() {
                if *uid != user_id || !path.starts_with(prefix.as_str()) || path.as_str() == prefix.as_str() {
                    continue;
                }
                let rest = &path[prefix.as_str().len()..];
                let mut acc = prefix.as_str().to_string();
                let mut segments: Vec<&str> = rest.split('/').collect();
                segments.pop();
                for segment in segments {
                    if segment.is_empty() {
                        continue;
                    }
                    acc.push_str(segment);
                    acc.push('/');
                    if seen_dirs.insert(acc.clone()) {
                        entries.push(ObjectEntry {
                            path: NormalizedPath::parse(&acc).map_err(ObjectStoreError::Other)?,
                            size: 0,
                            last_modified: obj.stat.last_modified,
                            is_collection: true,
                        });
                    }
                }
                // A collection marker's own directory entry was already
                // synthesized (or deduped) by the loop above; only leaf
                // files still need their own entry here.
                if !obj.stat.is_collection {
                    entries.push(ObjectEntry {
                        path: obj.stat.path.clone(),
                        size: obj.stat.size,
                        last_modified: obj.stat.last_modified,
                        is_collection: false,
                    });
                }
            }
            return Ok(entries);
        }

        let mut direct_files = Vec::new();
        let mut seen_dirs = HashSet::new();
        for ((uid, path), obj) in objects.iter() {
            if *uid != user_id || !path.starts_with(prefix.as_str()) || path.as_str() == prefix.as_str() {
                continue;
            }
            let rest = &path[prefix.as_str().len()..];
            match rest.find('/') {
                None => direct_files.push(ObjectEntry {
                    path: obj.stat.path.clone(),
                    size: obj.stat.size,
                    last_modified: obj.stat.last_modified,
                    is_collection: false,
                }),
                Some(idx) => {
                    let dir_name = &rest[..idx];
                    if seen_dirs.insert(dir_name.to_string()) {
                        direct_files.push(ObjectEntry {
                            path: prefix.join(&format!("{dir_name}/")),
                            size: 0,
                            last_modified: obj.stat.last_modified,
                            is_collection: true,
                        });
                    }
                }
            }
        }
        Ok(direct_files)
    }

    async fn copy(&self, user_id: Uuid, src: &NormalizedPath, dst: &NormalizedPath) -> Result<(), ObjectStoreError> {
        let obj = self
            .objects
            .lock()
            .get(&Self::key(user_id, src))
            .cloned()
            .ok_or(ObjectStoreError::NotFound)?;
        let now = Utc::now();
        self.objects.lock().insert(
            Self::key(user_id, dst),
            StoredObject {
                stat: ObjectStat {
                    path: dst.clone(),
                    last_modified: now,
                    created_at: now,
                    ..obj.stat
                },
                ..obj
            },
        );
        Ok(())
    }

    async fn mv(&self, user_id: Uuid, src: &NormalizedPath, dst: &NormalizedPath) -> Result<(), ObjectStoreError> {
        self.copy(user_id, src, dst).await?;
        self.delete(user_id, src).await
    }

    async fn create_folder(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(), ObjectStoreError> {
        let collection = path.as_collection();
        let now = Utc::now();
        self.objects.lock().insert(
            Self::key(user_id, &collection),
            StoredObject {
                body: Bytes::new(),
                stat: ObjectStat {
                    path: collection,
                    size: 0,
                    content_type: "application/x-directory".to_string(),
                    last_modified: now,
                    created_at: now,
                    is_collection: true,
                },
            },
        );
        Ok(())
    }

    async fn delete_folder(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.lock();
        let to_remove: Vec<_> = objects
            .keys()
            .filter(|(uid, p)| *uid == user_id && p.starts_with(path.as_str()))
            .cloned()
            .collect();
        for key in to_remove {
            objects.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let store = MemoryObjectStore::new();
        let user = Uuid::new_v4();
        let path = NormalizedPath::parse("/a.txt").unwrap();
        store.put(user, &path, Bytes::from_static(b"hello"), "text/plain").await.unwrap();

        let (stat, _) = store.get(user, &path).await.unwrap();
        assert_eq!(stat.size, 5);
        assert!(!stat.is_collection);
    }

    #[tokio::test]
    async fn collection_is_inferred_from_descendant_key() {
        let store = MemoryObjectStore::new();
        let user = Uuid::new_v4();
        let folder = NormalizedPath::parse("/docs/").unwrap();
        let file = NormalizedPath::parse("/docs/a.txt").unwrap();
        store.put(user, &file, Bytes::from_static(b"x"), "text/plain").await.unwrap();

        let stat = store.stat(user, &folder).await.unwrap();
        assert!(stat.is_collection);
    }

    #[tokio::test]
    async fn stat_of_unknown_path_not_found() {
        let store = MemoryObjectStore::new();
        let err = store.stat(Uuid::new_v4(), &NormalizedPath::parse("/missing").unwrap()).await;
        assert!(matches!(err, Err(ObjectStoreError::NotFound)));
    }

    #[tokio::test]
    async fn non_recursive_list_collapses_into_one_directory_entry() {
        let store = MemoryObjectStore::new();
        let user = Uuid::new_v4();
        store
            .put(user, &NormalizedPath::parse("/docs/a.txt").unwrap(), Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        store
            .put(user, &NormalizedPath::parse("/docs/b.txt").unwrap(), Bytes::from_static(b"y"), "text/plain")
            .await
            .unwrap();
        store
            .put(user, &NormalizedPath::parse("/top.txt").unwrap(), Bytes::from_static(b"z"), "text/plain")
            .await
            .unwrap();

        let entries = store.list(user, &NormalizedPath::root(), false).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.is_collection && e.path.as_str() == "/docs/"));
        assert!(entries.iter().any(|e| !e.is_collection && e.path.as_str() == "/top.txt"));
    }

    #[tokio::test]
    async fn recursive_list_synthesizes_intermediate_directory_entries() {
        let store = MemoryObjectStore::new();
        let user = Uuid::new_v4();
        store
            .put(user, &NormalizedPath::parse("/docs/sub/a.txt").unwrap(), Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        store
            .put(user, &NormalizedPath::parse("/top.txt").unwrap(), Bytes::from_static(b"y"), "text/plain")
            .await
            .unwrap();

        let entries = store.list(user, &NormalizedPath::root(), true).await.unwrap();
        assert!(entries.iter().any(|e| e.is_collection && e.path.as_str() == "/docs/"));
        assert!(entries.iter().any(|e| e.is_collection && e.path.as_str() == "/docs/sub/"));
        assert!(entries.iter().any(|e| !e.is_collection && e.path.as_str() == "/docs/sub/a.txt"));
        assert!(entries.iter().any(|e| !e.is_collection && e.path.as_str() == "/top.txt"));
    }

    #[tokio::test]
    async fn mv_removes_source_and_creates_destination() {
        let store = MemoryObjectStore::new();
        let user = Uuid::new_v4();
        let src = NormalizedPath::parse("/a.txt").unwrap();
        let dst = NormalizedPath::parse("/b.txt").unwrap();
        store.put(user, &src, Bytes::from_static(b"x"), "text/plain").await.unwrap();

        store.mv(user, &src, &dst).await.unwrap();
        assert!(matches!(store.stat(user, &src).await, Err(ObjectStoreError::NotFound)));
        assert!(store.stat(user, &dst).await.is_ok());
    }
}
