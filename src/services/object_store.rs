//! src/services/object_store.rs
//!
//! Object Store Gateway: list, put and delete against a bucket. Each call is
//! a single request to the backend: no pagination, no multipart, no retries.
//! `S3ObjectStore` talks to AWS; `MemoryObjectStore` keeps everything in a
//! map and backs the test suite.

use crate::models::object::StorageObject;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Host suffix separating the bucket endpoint from the object key in a
/// public object URL.
pub const STORAGE_DOMAIN_SUFFIX: &str = ".amazonaws.com/";

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("{operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// The three bucket operations the relay forwards to.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists every object the backend returns in one page.
    async fn list_objects(&self, bucket: &str) -> ObjectStoreResult<Vec<StorageObject>>;

    /// Writes `body` at `key`, replacing whatever was there. Returns the key.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> ObjectStoreResult<String>;

    /// Removes `key`. Deleting a missing key is not an error. Returns the key.
    async fn delete_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<String>;
}

/// Public URL of an object, in virtual-hosted style.
pub fn public_object_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}{STORAGE_DOMAIN_SUFFIX}{key}")
}

/// Recover the object key from a URL built by [`public_object_url`].
///
/// Returns `None` when the URL has no storage domain or nothing after it.
pub fn object_key_from_url(url: &str) -> Option<&str> {
    url.split_once(STORAGE_DOMAIN_SUFFIX)
        .map(|(_, key)| key)
        .filter(|key| !key.is_empty())
}

/// Gateway backed by Amazon S3.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

fn backend_error<E>(operation: &'static str, err: E) -> ObjectStoreError
where
    E: std::error::Error + 'static,
{
    ObjectStoreError::Backend {
        operation,
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_objects(&self, bucket: &str) -> ObjectStoreResult<Vec<StorageObject>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_no_such_bucket())
                {
                    ObjectStoreError::BucketNotFound(bucket.to_string())
                } else {
                    backend_error("ListObjectsV2", err)
                }
            })?;

        if output.is_truncated().unwrap_or(false) {
            debug!("listing of `{}` truncated after first page", bucket);
        }

        let objects = output
            .contents()
            .iter()
            .map(|obj| StorageObject {
                key: obj.key().unwrap_or_default().to_string(),
                size: u64::try_from(obj.size().unwrap_or_default()).unwrap_or(0),
                last_modified: obj
                    .last_modified()
                    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())),
            })
            .collect();

        Ok(objects)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> ObjectStoreResult<String> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| backend_error("PutObject", err))?;
        Ok(key.to_string())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<String> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| backend_error("DeleteObject", err))?;
        Ok(key.to_string())
    }
}

/// In-memory gateway. Buckets must be registered with [`MemoryObjectStore::with_bucket`].
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, Bytes>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.get_mut().entry(bucket.into()).or_default();
        self
    }

    /// Payload stored at `key`, if any.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, bucket: &str) -> ObjectStoreResult<Vec<StorageObject>> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| ObjectStoreError::BucketNotFound(bucket.to_string()))?;
        Ok(objects
            .iter()
            .map(|(key, body)| StorageObject::new(key.clone(), body.len() as u64))
            .collect())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> ObjectStoreResult<String> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| ObjectStoreError::BucketNotFound(bucket.to_string()))?;
        objects.insert(key.to_string(), body);
        Ok(key.to_string())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<String> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| ObjectStoreError::BucketNotFound(bucket.to_string()))?;
        if objects.remove(key).is_none() {
            debug!("object `{}` already missing from `{}`", key, bucket);
        }
        Ok(key.to_string())
    }
}
