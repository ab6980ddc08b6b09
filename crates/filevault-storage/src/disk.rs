use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use md5::{Digest, Md5};
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::listing::group_keys;
use crate::traits::{ByteStream, ObjectStat, ObjectStore};

const SYS_DIR_NAME: &str = ".filevault.sys";
const TMP_DIR_NAME: &str = "tmp";
const META_SUFFIX: &str = ".meta";

/// Object store on a local directory.
///
/// Each object is a data file plus a JSON sidecar under `<root>/<bucket>/`.
/// File names are percent-encoded keys, so keys with a trailing `/` are
/// ordinary files and never collide with the sidecar suffix.
#[derive(Debug, Clone)]
pub struct DiskObjectStore {
    root_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskMeta {
    version: String,
    size: u64,
    etag: String,
    mod_time: DateTime<Utc>,
}

impl DiskMeta {
    fn into_stat(self) -> ObjectStat {
        ObjectStat {
            size: self.size,
            etag: self.etag,
            last_modified: self.mod_time,
        }
    }
}

impl DiskObjectStore {
    pub async fn new(root_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root_dir).await?;
        fs::create_dir_all(root_dir.join(SYS_DIR_NAME).join(TMP_DIR_NAME)).await?;
        Ok(Self { root_dir })
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root_dir.join(bucket)
    }

    fn data_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_path(bucket).join(encode_key(key))
    }

    fn meta_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_path(bucket)
            .join(format!("{}{META_SUFFIX}", encode_key(key)))
    }

    fn tmp_path(&self) -> PathBuf {
        self.root_dir
            .join(SYS_DIR_NAME)
            .join(TMP_DIR_NAME)
            .join(Uuid::new_v4().to_string())
    }

    async fn ensure_bucket_exists(&self, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        if !is_existing_directory(&self.bucket_path(bucket)).await? {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        Ok(())
    }

    async fn read_meta(&self, bucket: &str, key: &str) -> Result<DiskMeta> {
        let meta_bytes = match fs::read(self.meta_path(bucket, key)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(bucket, key));
            }
            Err(err) => return Err(StoreError::Io(err)),
        };
        serde_json::from_slice(&meta_bytes)
            .map_err(|err| StoreError::Internal(format!("failed to parse object meta: {err}")))
    }

    async fn write_meta(&self, bucket: &str, key: &str, meta: &DiskMeta) -> Result<()> {
        let meta_json = serde_json::to_vec(meta)
            .map_err(|err| StoreError::Internal(format!("failed to serialize object meta: {err}")))?;
        let tmp = self.tmp_path();
        fs::write(&tmp, meta_json).await?;
        fs::rename(&tmp, self.meta_path(bucket, key)).await?;
        Ok(())
    }

    async fn remove_object_files(&self, bucket: &str, key: &str) -> Result<()> {
        // The sidecar goes first so a half-removed object is no longer visible.
        remove_if_exists(&self.meta_path(bucket, key)).await?;
        remove_if_exists(&self.data_path(bucket, key)).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        fs::create_dir_all(self.bucket_path(bucket)).await?;
        Ok(())
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat> {
        self.ensure_bucket_exists(bucket).await?;
        validate_object_key(key)?;
        Ok(self.read_meta(bucket, key).await?.into_stat())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        recursive: bool,
    ) -> Result<Vec<String>> {
        self.ensure_bucket_exists(bucket).await?;

        let mut entries = fs::read_dir(self.bucket_path(bucket)).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(encoded) = file_name.strip_suffix(META_SUFFIX) else {
                continue;
            };
            match decode_key(encoded) {
                Some(key) => keys.push(key),
                None => warn!(bucket, file = %file_name, "skipping undecodable object name"),
            }
        }

        Ok(group_keys(keys, prefix, delimiter, recursive))
    }

    async fn put(&self, bucket: &str, key: &str, body: ByteStream, size: u64) -> Result<()> {
        self.ensure_bucket_exists(bucket).await?;
        validate_object_key(key)?;

        let tmp = self.tmp_path();
        let (received, etag) = match write_body(&tmp, body).await {
            Ok(written) => written,
            Err(err) => {
                remove_if_exists(&tmp).await?;
                return Err(StoreError::Io(err));
            }
        };

        if received != size {
            remove_if_exists(&tmp).await?;
            return Err(StoreError::SizeMismatch {
                key: key.to_string(),
                declared: size,
                received,
            });
        }

        fs::rename(&tmp, self.data_path(bucket, key)).await?;
        let meta = DiskMeta {
            version: "1.0".to_string(),
            size,
            etag,
            mod_time: Utc::now(),
        };
        self.write_meta(bucket, key, &meta).await
    }

    async fn copy(&self, bucket: &str, src_key: &str, dst_key: &str) -> Result<()> {
        self.ensure_bucket_exists(bucket).await?;
        validate_object_key(src_key)?;
        validate_object_key(dst_key)?;

        let mut meta = self.read_meta(bucket, src_key).await?;
        let tmp = self.tmp_path();
        fs::copy(self.data_path(bucket, src_key), &tmp)
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => StoreError::not_found(bucket, src_key),
                _ => StoreError::Io(err),
            })?;
        fs::rename(&tmp, self.data_path(bucket, dst_key)).await?;

        meta.mod_time = Utc::now();
        self.write_meta(bucket, dst_key, &meta).await
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        self.ensure_bucket_exists(bucket).await?;
        validate_object_key(key)?;
        self.remove_object_files(bucket, key).await
    }

    async fn bulk_remove(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>> {
        self.ensure_bucket_exists(bucket).await?;

        let mut failed = Vec::new();
        for key in keys {
            let removed = match validate_object_key(&key) {
                Ok(()) => self.remove_object_files(bucket, &key).await,
                Err(err) => Err(err),
            };
            if let Err(err) = removed {
                warn!(bucket, key = %key, error = %err, "failed to remove object");
                failed.push(key);
            }
        }
        Ok(failed)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        self.ensure_bucket_exists(bucket).await?;
        validate_object_key(key)?;
        self.read_meta(bucket, key).await?;

        let file = fs::File::open(self.data_path(bucket, key))
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => StoreError::not_found(bucket, key),
                _ => StoreError::Io(err),
            })?;
        Ok(ReaderStream::new(file).boxed())
    }
}

fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, NON_ALPHANUMERIC).to_string()
}

fn decode_key(encoded: &str) -> Option<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

fn validate_bucket_name(bucket: &str) -> Result<()> {
    if bucket.is_empty()
        || bucket == SYS_DIR_NAME
        || bucket.starts_with('.')
        || bucket.contains('/')
        || bucket.contains('\\')
    {
        return Err(StoreError::InvalidBucketName(bucket.to_string()));
    }
    Ok(())
}

fn validate_object_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

async fn is_existing_directory(path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_dir()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(StoreError::Io(err)),
    }
}

/// Streams `body` into a new file at `path`. Returns the byte count and the
/// md5 etag. The file handle is closed on every exit.
async fn write_body(path: &Path, mut body: ByteStream) -> std::io::Result<(u64, String)> {
    let mut file = fs::File::create(path).await?;
    let mut hasher = Md5::new();
    let mut received = 0_u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        received += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok((received, format!("{:x}", hasher.finalize())))
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Io(err)),
    }
}
