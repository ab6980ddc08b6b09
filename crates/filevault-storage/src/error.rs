use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket not found: {0}")]
    BucketNotFound(String),
    #[error("invalid bucket name: {0}")]
    InvalidBucketName(String),
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("size mismatch for {key}: declared {declared}, received {received}")]
    SizeMismatch {
        key: String,
        declared: u64,
        received: u64,
    },
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
