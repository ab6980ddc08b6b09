use async_trait::async_trait;
use filevault_common::{
    error::{Result, VaultError},
    types::{ResourceInfo, ResourceType},
};
use futures::{StreamExt, stream};
use tracing::{info, warn};

use super::{ResourceDownload, ResourceHandler, info_for};
use crate::archive::ZipStreamer;
use crate::keys::{parent_path, resource_name};
use crate::locator::{ResourceContext, ResourceLocator, store_access_error};
use crate::placeholder::DirectoryPlaceholderManager;

/// Archive name offered when the whole root is downloaded.
const ROOT_ARCHIVE_NAME: &str = "files";

/// A directory is every key under its prefix, placeholder included.
#[derive(Clone)]
pub struct DirectoryHandler {
    locator: ResourceLocator,
    placeholders: DirectoryPlaceholderManager,
    streamer: ZipStreamer,
    copy_concurrency: usize,
}

impl DirectoryHandler {
    pub fn new(
        locator: ResourceLocator,
        placeholders: DirectoryPlaceholderManager,
        copy_concurrency: usize,
    ) -> Self {
        let streamer = ZipStreamer::new(locator.store());
        Self {
            locator,
            placeholders,
            streamer,
            copy_concurrency: copy_concurrency.max(1),
        }
    }

    async fn require_exists(&self, prefix: &str) -> Result<()> {
        if !self.locator.directory_exists(prefix).await? {
            warn!(bucket = self.locator.bucket(), prefix, "directory does not exist");
            return Err(VaultError::DirectoryNotFound(format!(
                "the directory on the path '{prefix}' was not found"
            )));
        }
        Ok(())
    }

    async fn require_absent(&self, prefix: &str) -> Result<()> {
        if self.locator.directory_exists(prefix).await? {
            warn!(bucket = self.locator.bucket(), prefix, "directory already exists");
            return Err(VaultError::ResourceAlreadyExists(format!(
                "the directory on the path '{prefix}' already exists"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for DirectoryHandler {
    fn supported_type(&self) -> ResourceType {
        ResourceType::Directory
    }

    async fn get_info(&self, context: &ResourceContext) -> Result<ResourceInfo> {
        self.require_exists(&context.absolute_key).await?;
        Ok(info_for(context, None))
    }

    async fn copy(&self, source: &ResourceContext, destination_key: &str) -> Result<()> {
        self.require_exists(&source.absolute_key).await?;
        self.require_absent(destination_key).await?;

        let keys = self.locator.list_recursive(&source.absolute_key).await?;
        let total = keys.len();
        let store = self.locator.store();

        let failures: Vec<(String, VaultError)> = stream::iter(keys)
            .map(|key| {
                let store = store.clone();
                let target = match key.strip_prefix(source.absolute_key.as_str()) {
                    Some(suffix) => format!("{destination_key}{suffix}"),
                    None => destination_key.to_string(),
                };
                async move {
                    match store.copy(&source.bucket, &key, &target).await {
                        Ok(()) => None,
                        Err(err) => {
                            let err = store_access_error("copy", &key, err);
                            Some((key, err))
                        }
                    }
                }
            })
            .buffer_unordered(self.copy_concurrency)
            .filter_map(futures::future::ready)
            .collect()
            .await;

        if let Some((_, first)) = failures.first() {
            let failed_keys: Vec<&str> = failures.iter().map(|(key, _)| key.as_str()).collect();
            warn!(
                bucket = %source.bucket,
                source = %source.absolute_key,
                destination = destination_key,
                failed = ?failed_keys,
                total,
                "directory copy left a partial result"
            );
            return Err(VaultError::ObjectStoreAccess(format!(
                "copy of '{}' failed for {} of {total} objects, first error: {first}",
                source.absolute_key,
                failed_keys.len()
            )));
        }

        info!(
            bucket = %source.bucket,
            source = %source.absolute_key,
            destination = destination_key,
            objects = total,
            "copied directory"
        );
        Ok(())
    }

    async fn delete(&self, context: &ResourceContext) -> Result<()> {
        self.require_exists(&context.absolute_key).await?;

        let keys = self.locator.list_recursive(&context.absolute_key).await?;
        let total = keys.len();
        let failed_keys = self
            .locator
            .store()
            .bulk_remove(&context.bucket, keys)
            .await
            .map_err(|err| store_access_error("bulk remove", &context.absolute_key, err))?;

        if !failed_keys.is_empty() {
            warn!(
                bucket = %context.bucket,
                prefix = %context.absolute_key,
                failed = failed_keys.len(),
                total,
                "directory delete partially failed"
            );
            return Err(VaultError::DirectoryDeletionPartialFailure {
                prefix: context.absolute_key.clone(),
                failed_keys,
            });
        }
        info!(bucket = %context.bucket, prefix = %context.absolute_key, objects = total, "deleted directory");

        self.placeholders
            .ensure_directory_placeholder(parent_path(&context.absolute_key))
            .await?;
        Ok(())
    }

    async fn download(&self, context: &ResourceContext) -> Result<ResourceDownload> {
        self.require_exists(&context.absolute_key).await?;
        let keys = self.locator.list_recursive(&context.absolute_key).await?;
        info!(
            bucket = %context.bucket,
            prefix = %context.absolute_key,
            objects = keys.len(),
            "streaming directory as zip"
        );

        let body = self
            .streamer
            .stream(&context.bucket, &context.absolute_key, keys);
        let name = match resource_name(&context.relative_path) {
            "" => ROOT_ARCHIVE_NAME,
            name => name,
        };
        Ok(ResourceDownload {
            file_name: format!("{name}.zip"),
            body,
        })
    }
}
