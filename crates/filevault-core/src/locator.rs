use std::sync::Arc;

use filevault_common::{
    error::{Result, VaultError},
    types::ResourceType,
};
use filevault_storage::{ObjectStore, StoreError};
use tracing::{debug, error};

use crate::keys::{DELIMITER, is_directory_path};

/// Per-user key prefix, `user-<id>-files/`. Computed, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRoot {
    user_id: u64,
    prefix: String,
}

impl UserRoot {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            prefix: format!("user-{user_id}-files/"),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn absolute_key(&self, relative_path: &str) -> String {
        format!("{}{}", self.prefix, relative_path)
    }

    /// Strips the root prefix from a key the store handed back.
    pub fn relative_path<'a>(&self, key: &'a str) -> Result<&'a str> {
        key.strip_prefix(self.prefix.as_str()).ok_or_else(|| {
            error!(user_id = self.user_id, key, "object key outside of user root");
            VaultError::ObjectStoreAccess(format!("object key '{key}' is outside of the user root"))
        })
    }
}

/// Everything one operation needs to know about its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContext {
    pub bucket: String,
    pub absolute_key: String,
    pub relative_path: String,
    pub resource_type: ResourceType,
}

pub(crate) fn store_access_error(operation: &str, key: &str, err: StoreError) -> VaultError {
    error!(operation, key, error = %err, "object store call failed");
    VaultError::ObjectStoreAccess(format!("{operation} failed for '{key}': {err}"))
}

/// Resolves keys against the store.
#[derive(Clone)]
pub struct ResourceLocator {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ResourceLocator {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Builds the context for `relative_path` under `root`, resolving its
    /// type. Every key used for a user passes through here.
    pub async fn context(&self, root: &UserRoot, relative_path: &str) -> Result<ResourceContext> {
        let absolute_key = root.absolute_key(relative_path);
        let resource_type = self.resolve_type(&absolute_key).await?;
        Ok(ResourceContext {
            bucket: self.bucket.clone(),
            absolute_key,
            relative_path: relative_path.to_string(),
            resource_type,
        })
    }

    /// The trailing slash alone picks the candidate type; the store only
    /// confirms it.
    pub async fn resolve_type(&self, key: &str) -> Result<ResourceType> {
        let candidate = ResourceType::from_path(key);
        let exists = match candidate {
            ResourceType::File => self.file_exists(key).await?,
            ResourceType::Directory => self.directory_exists(key).await?,
        };

        if !exists {
            debug!(bucket = %self.bucket, key, "resource not found");
            return Err(VaultError::ResourceNotFound(format!(
                "the resource on the path '{key}' was not found"
            )));
        }
        debug!(bucket = %self.bucket, key, resource_type = %candidate, "resolved resource type");
        Ok(candidate)
    }

    pub async fn file_exists(&self, key: &str) -> Result<bool> {
        if is_directory_path(key) {
            return Ok(false);
        }
        match self.store.stat(&self.bucket, key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(store_access_error("stat", key, err)),
        }
    }

    pub async fn directory_exists(&self, prefix: &str) -> Result<bool> {
        if !is_directory_path(prefix) {
            return Ok(false);
        }
        let entries = self.list_direct(prefix).await?;
        Ok(!entries.is_empty())
    }

    pub async fn file_size(&self, key: &str) -> Result<u64> {
        match self.store.stat(&self.bucket, key).await {
            Ok(stat) => Ok(stat.size),
            Err(err) if err.is_not_found() => Err(VaultError::ResourceNotFound(format!(
                "the file on the path '{key}' was not found"
            ))),
            Err(err) => Err(store_access_error("stat", key, err)),
        }
    }

    /// Direct children of `prefix` plus the prefix's own placeholder, if any.
    pub async fn list_direct(&self, prefix: &str) -> Result<Vec<String>> {
        self.store
            .list(&self.bucket, prefix, DELIMITER, false)
            .await
            .map_err(|err| store_access_error("list", prefix, err))
    }

    pub async fn list_recursive(&self, prefix: &str) -> Result<Vec<String>> {
        self.store
            .list(&self.bucket, prefix, DELIMITER, true)
            .await
            .map_err(|err| store_access_error("list", prefix, err))
    }
}
