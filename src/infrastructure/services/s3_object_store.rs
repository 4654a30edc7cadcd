/**
 * Production `ObjectStore`, one S3-compatible bucket per tenant. Client
 * construction mirrors the `aws-sdk-s3` usage pattern: an explicit
 * `Credentials`/`Region`/`Config` build rather than relying on ambient
 * environment discovery, since each deployment points at a specific
 * (possibly non-AWS) endpoint.
 *
 * Collections are never stored as objects: `stat`/`list` treat any path
 * ending in `/` as a collection if either it's the root or at least one
 * key exists under it as a prefix.
 */
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client as S3Client, Config as S3Config};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::ports::object_store_port::{
    ObjectBody, ObjectEntry, ObjectStat, ObjectStore, ObjectStoreError, PutOutcome,
};
use crate::common::config::StorageConfig;
use crate::domain::entities::path::NormalizedPath;

pub struct S3ObjectStore {
    client: S3Client,
    bucket_prefix: String,
    known_buckets: RwLock<HashSet<Uuid>>,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.s3_access_key.clone().unwrap_or_default(),
            config.s3_secret_key.clone().unwrap_or_default(),
            None,
            None,
            "webdav-gateway",
        );

        let mut builder = S3Config::builder()
            .region(Region::new(config.s3_region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.s3_force_path_style);
        if let Some(endpoint) = &config.s3_endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket_prefix: config.bucket_prefix.clone(),
            known_buckets: RwLock::new(HashSet::new()),
        }
    }

    fn bucket_name(&self, user_id: Uuid) -> String {
        format!("{}{}", self.bucket_prefix, user_id)
    }

    fn object_key(path: &NormalizedPath) -> String {
        path.as_str().trim_start_matches('/').to_string()
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn ensure_bucket(&self, user_id: Uuid) -> Result<(), ObjectStoreError> {
        if self.known_buckets.read().await.contains(&user_id) {
            return Ok(());
        }

        let bucket = self.bucket_name(user_id);
        let exists = self.client.head_bucket().bucket(&bucket).send().await.is_ok();
        if !exists {
            self.client
                .create_bucket()
                .bucket(&bucket)
                .send()
                .await
                .map_err(|e| ObjectStoreError::BackendUnavailable(e.to_string()))?;
        }

        self.known_buckets.write().await.insert(user_id);
        Ok(())
    }

    async fn stat(&self, user_id: Uuid, path: &NormalizedPath) -> Result<ObjectStat, ObjectStoreError> {
        let bucket = self.bucket_name(user_id);
        let key = Self::object_key(path);

        if !path.is_collection() {
            let head = self.client.head_object().bucket(&bucket).key(&key).send().await;
            return match head {
                Ok(output) => Ok(ObjectStat {
                    path: path.clone(),
                    size: output.content_length().unwrap_or(0).max(0) as u64,
                    content_type: output.content_type().unwrap_or("application/octet-stream").to_string(),
                    last_modified: smithy_dt_to_chrono(output.last_modified()),
                    created_at: smithy_dt_to_chrono(output.last_modified()),
                    is_collection: false,
                }),
                Err(e) => Err(map_not_found(e)),
            };
        }

        if path.is_root() {
            return Ok(ObjectStat {
                path: path.clone(),
                size: 0,
                content_type: "application/x-directory".to_string(),
                last_modified: Utc::now(),
                created_at: Utc::now(),
                is_collection: true,
            });
        }

        let listing = self
            .client
            .list_objects_v2()
            .bucket(&bucket)
            .prefix(&key)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| ObjectStoreError::BackendUnavailable(e.to_string()))?;

        if listing.contents().is_empty() {
            return Err(ObjectStoreError::NotFound);
        }

        Ok(ObjectStat {
            path: path.clone(),
            size: 0,
            content_type: "application/x-directory".to_string(),
            last_modified: Utc::now(),
            created_at: Utc::now(),
            is_collection: true,
        })
    }

    async fn get(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(ObjectStat, ObjectBody), ObjectStoreError> {
        let bucket = self.bucket_name(user_id);
        let key = Self::object_key(path);

        let output = self
            .client
            .get_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(map_not_found)?;

        let stat = ObjectStat {
            path: path.clone(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().unwrap_or("application/octet-stream").to_string(),
            last_modified: smithy_dt_to_chrono(output.last_modified()),
            created_at: smithy_dt_to_chrono(output.last_modified()),
            is_collection: false,
        };

        let body: ObjectBody = output
            .body
            .map(|r| r.map_err(|e| ObjectStoreError::BackendUnavailable(e.to_string())))
            .boxed();

        Ok((stat, body))
    }

    async fn put(
        &self,
        user_id: Uuid,
        path: &NormalizedPath,
        body: Bytes,
        content_type: &str,
    ) -> Result<PutOutcome, ObjectStoreError> {
        let bucket = self.bucket_name(user_id);
        let key = Self::object_key(path);

        let outcome = if self.client.head_object().bucket(&bucket).key(&key).send().await.is_ok() {
            PutOutcome::Overwritten
        } else {
            PutOutcome::Created
        };

        self.client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| ObjectStoreError::BackendUnavailable(e.to_string()))?;

        Ok(outcome)
    }

    async fn delete(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(), ObjectStoreError> {
        let bucket = self.bucket_name(user_id);
        let key = Self::object_key(path);
        self.client
            .delete_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::BackendUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn list(
        &self,
        user_id: Uuid,
        prefix: &NormalizedPath,
        recursive: bool,
    ) -> Result<Vec<ObjectEntry>, ObjectStoreError> {
        let bucket = self.bucket_name(user_id);
        let prefix_key = Self::object_key(prefix);

        let mut request = self.client.list_objects_v2().bucket(&bucket).prefix(&prefix_key);
        if !recursive {
            request = request.delimiter("/");
        }

        let output = request
            .send()
            .await
            .map_err(|e| ObjectStoreError::BackendUnavailable(e.to_string()))?;

        let mut entries = Vec::new();
        let mut seen_dirs: HashSet<String> = HashSet::new();
        for object in output.contents() {
            let Some(key) = object.key() else { continue };
            if key == prefix_key {
                continue;
            }
            // Depth-infinity PROPFIND needs a `d:response` for every
            // intermediate collection too, not just leaf files: the object
            // store has no directory objects of its own, so synthesize one
            // entry per unique ancestor prefix the recursive listing implies.
            if recursive {
                for dir in intermediate_dirs(&prefix_key, key) {
                    if seen_dirs.insert(dir.clone()) {
                        entries.push(ObjectEntry {
                            path: NormalizedPath::parse(&format!("/{dir}")).map_err(ObjectStoreError::Other)?,
                            size: 0,
                            last_modified: Utc::now(),
                            is_collection: true,
                        });
                    }
                }
            }
            // A key ending in `/` is a collection marker, not a leaf file.
            // In a recursive listing its directory entry was already
            // synthesized above; in a non-recursive listing a childless
            // collection never gets a `CommonPrefixes` entry, so it must be
            // added here instead, once.
            if key.ends_with('/') {
                if seen_dirs.insert(key.to_string()) {
                    entries.push(ObjectEntry {
                        path: NormalizedPath::parse(&format!("/{key}")).map_err(ObjectStoreError::Other)?,
                        size: 0,
                        last_modified: smithy_dt_to_chrono(object.last_modified()),
                        is_collection: true,
                    });
                }
                continue;
            }
            entries.push(ObjectEntry {
                path: NormalizedPath::parse(&format!("/{key}")).map_err(ObjectStoreError::Other)?,
                size: object.size().unwrap_or(0).max(0) as u64,
                last_modified: smithy_dt_to_chrono(object.last_modified()),
                is_collection: false,
            });
        }
        for common_prefix in output.common_prefixes() {
            let Some(p) = common_prefix.prefix() else { continue };
            entries.push(ObjectEntry {
                path: NormalizedPath::parse(&format!("/{p}")).map_err(ObjectStoreError::Other)?,
                size: 0,
                last_modified: Utc::now(),
                is_collection: true,
            });
        }

        Ok(entries)
    }

    async fn copy(&self, user_id: Uuid, src: &NormalizedPath, dst: &NormalizedPath) -> Result<(), ObjectStoreError> {
        let bucket = self.bucket_name(user_id);
        let src_key = Self::object_key(src);
        let dst_key = Self::object_key(dst);

        self.client
            .copy_object()
            .bucket(&bucket)
            .key(&dst_key)
            .copy_source(format!("{bucket}/{src_key}"))
            .send()
            .await
            .map_err(map_not_found)?;
        Ok(())
    }

    async fn mv(&self, user_id: Uuid, src: &NormalizedPath, dst: &NormalizedPath) -> Result<(), ObjectStoreError> {
        self.copy(user_id, src, dst).await?;
        self.delete(user_id, src).await
    }

    async fn create_folder(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(), ObjectStoreError> {
        let bucket = self.bucket_name(user_id);
        let key = Self::object_key(&path.as_collection());

        self.client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .content_type("application/x-directory")
            .body(ByteStream::from(Bytes::new()))
            .send()
            .await
            .map_err(|e| ObjectStoreError::BackendUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Single `list` + `delete_objects` batch; beyond the first 1000 keys
    /// under the prefix this leaves the remainder in place rather than
    /// paginating, matching the object store port's documented partial-
    /// failure contract.
    async fn delete_folder(&self, user_id: Uuid, path: &NormalizedPath) -> Result<(), ObjectStoreError> {
        let bucket = self.bucket_name(user_id);
        let prefix_key = Self::object_key(path);

        let listing = self
            .client
            .list_objects_v2()
            .bucket(&bucket)
            .prefix(&prefix_key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::BackendUnavailable(e.to_string()))?;

        let keys: Vec<String> = listing.contents().iter().filter_map(|o| o.key().map(str::to_string)).collect();
        if keys.is_empty() {
            return Ok(());
        }

        for key in keys {
            self.client
                .delete_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| ObjectStoreError::BackendUnavailable(e.to_string()))?;
        }

        Ok(())
    }
}

/// Every full directory prefix strictly between `prefix_key` and `key`'s own
/// parent, e.g. `("", "a/b/c.txt")` yields `["a/", "a/b/"]`.
fn intermediate_dirs(prefix_key: &str, key: &str) -> Vec<String> {
    let rest = key.strip_prefix(prefix_key).unwrap_or(key);
    let mut segments = rest.split('/').collect::<Vec<_>>();
    segments.pop();

    let mut dirs = Vec::with_capacity(segments.len());
    let mut acc = prefix_key.to_string();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        acc.push_str(segment);
        acc.push('/');
        dirs.push(acc.clone());
    }
    dirs
}

fn smithy_dt_to_chrono(dt: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    dt.and_then(|d| DateTime::from_timestamp(d.secs(), d.subsec_nanos()))
        .unwrap_or_else(Utc::now)
}

fn map_not_found<E: std::fmt::Display>(err: aws_sdk_s3::error::SdkError<E>) -> ObjectStoreError {
    if err.raw_response().map(|r| r.status().as_u16()) == Some(404) {
        ObjectStoreError::NotFound
    } else {
        ObjectStoreError::BackendUnavailable(err.to_string())
    }
}
