use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream::BoxStream};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Streamed object body. Errors surface as `std::io::Error` so the stream can
/// be handed to readers and HTTP bodies without conversion.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStat {
    pub size: u64,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

/// Narrow gateway over a flat key-value object store.
///
/// Keys are opaque strings; a trailing `/` carries no meaning to the store.
/// Listing without `recursive` groups everything past the next `delimiter`
/// into a single common-prefix entry, S3 style, and a key equal to `prefix`
/// is returned as-is.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn make_bucket(&self, bucket: &str) -> Result<()>;
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat>;
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        recursive: bool,
    ) -> Result<Vec<String>>;
    async fn put(&self, bucket: &str, key: &str, body: ByteStream, size: u64) -> Result<()>;
    async fn copy(&self, bucket: &str, src_key: &str, dst_key: &str) -> Result<()>;
    async fn remove(&self, bucket: &str, key: &str) -> Result<()>;
    /// Removes every key and returns the ones the store failed to delete.
    /// Missing keys are not failures.
    async fn bulk_remove(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>>;
    async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream>;
}

pub fn stream_from_bytes(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    futures::stream::once(async move { Ok(data) }).boxed()
}

pub fn empty_stream() -> ByteStream {
    futures::stream::empty().boxed()
}

pub async fn collect_stream(mut body: ByteStream) -> std::io::Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
