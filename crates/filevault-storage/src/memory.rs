use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::listing::group_keys;
use crate::traits::{ByteStream, ObjectStat, ObjectStore, collect_stream, stream_from_bytes};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(data: Bytes) -> Self {
        Self {
            etag: format!("{:x}", Md5::digest(&data)),
            last_modified: Utc::now(),
            data,
        }
    }

    fn stat(&self) -> ObjectStat {
        ObjectStat {
            size: self.data.len() as u64,
            etag: self.etag.clone(),
            last_modified: self.last_modified,
        }
    }
}

type Bucket = BTreeMap<String, StoredObject>;

/// Process-local object store. Every clone shares the same buckets.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, Bucket>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_bucket(bucket: &str) -> Result<Self> {
        let store = Self::new();
        store.make_bucket(bucket).await?;
        Ok(store)
    }

    /// Number of objects in `bucket`, placeholders included.
    pub async fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

fn bucket_not_found(bucket: &str) -> StoreError {
    StoreError::BucketNotFound(bucket.to_string())
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        if bucket.is_empty() || bucket.contains('/') {
            return Err(StoreError::InvalidBucketName(bucket.to_string()));
        }
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat> {
        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        objects
            .get(key)
            .map(StoredObject::stat)
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        recursive: bool,
    ) -> Result<Vec<String>> {
        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        let keys = objects
            .range(prefix.to_string()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix));
        Ok(group_keys(keys, prefix, delimiter, recursive))
    }

    async fn put(&self, bucket: &str, key: &str, body: ByteStream, size: u64) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        if !self.buckets.read().await.contains_key(bucket) {
            return Err(bucket_not_found(bucket));
        }

        let data = collect_stream(body).await?;
        let received = data.len() as u64;
        if received != size {
            return Err(StoreError::SizeMismatch {
                key: key.to_string(),
                declared: size,
                received,
            });
        }

        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        objects.insert(key.to_string(), StoredObject::new(data));
        Ok(())
    }

    async fn copy(&self, bucket: &str, src_key: &str, dst_key: &str) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        let source = objects
            .get(src_key)
            .ok_or_else(|| StoreError::not_found(bucket, src_key))?;
        let copied = StoredObject::new(source.data.clone());
        objects.insert(dst_key.to_string(), copied);
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        objects.remove(key);
        Ok(())
    }

    async fn bulk_remove(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        for key in &keys {
            objects.remove(key);
        }
        Ok(Vec::new())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        let object = objects
            .get(key)
            .ok_or_else(|| StoreError::not_found(bucket, key))?;
        Ok(stream_from_bytes(object.data.clone()))
    }
}
