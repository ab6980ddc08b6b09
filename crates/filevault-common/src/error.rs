use thiserror::Error;

use crate::types::ResourceType;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid path format: {0}")]
    InvalidPathFormat(String),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("resource already exists: {0}")]
    ResourceAlreadyExists(String),
    #[error("failed to delete some objects under {prefix}: {failed_keys:?}")]
    DirectoryDeletionPartialFailure {
        prefix: String,
        failed_keys: Vec<String>,
    },
    #[error("object store access error: {0}")]
    ObjectStoreAccess(String),
    #[error("no handler registered for {0}")]
    HandlerNotFound(ResourceType),
    #[error("upload too large: size={size}, max_size={max_size}")]
    UploadTooLarge { size: u64, max_size: u64 },
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

impl VaultError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPathFormat(_) => "InvalidPathFormat",
            Self::ResourceNotFound(_) => "ResourceNotFound",
            Self::DirectoryNotFound(_) => "DirectoryNotFound",
            Self::ResourceAlreadyExists(_) => "ResourceAlreadyExists",
            Self::DirectoryDeletionPartialFailure { .. } => "DirectoryDeletionPartialFailure",
            Self::ObjectStoreAccess(_) => "ObjectStoreAccess",
            Self::HandlerNotFound(_) => "HandlerNotFound",
            Self::UploadTooLarge { .. } => "UploadTooLarge",
            Self::Unauthenticated(_) => "Unauthenticated",
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
