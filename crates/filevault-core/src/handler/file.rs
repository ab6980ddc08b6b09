use async_trait::async_trait;
use filevault_common::{
    error::{Result, VaultError},
    types::{ResourceInfo, ResourceType},
};
use tracing::{info, warn};

use super::{ResourceDownload, ResourceHandler, info_for};
use crate::keys::{parent_path, resource_name};
use crate::locator::{ResourceContext, ResourceLocator, store_access_error};
use crate::placeholder::DirectoryPlaceholderManager;

/// A file is exactly one object key.
#[derive(Clone)]
pub struct FileHandler {
    locator: ResourceLocator,
    placeholders: DirectoryPlaceholderManager,
}

impl FileHandler {
    pub fn new(locator: ResourceLocator, placeholders: DirectoryPlaceholderManager) -> Self {
        Self {
            locator,
            placeholders,
        }
    }

    async fn require_exists(&self, key: &str) -> Result<()> {
        if !self.locator.file_exists(key).await? {
            warn!(bucket = self.locator.bucket(), key, "file does not exist");
            return Err(VaultError::ResourceNotFound(format!(
                "the file on the path '{key}' was not found"
            )));
        }
        Ok(())
    }

    async fn require_absent(&self, key: &str) -> Result<()> {
        if self.locator.file_exists(key).await? {
            warn!(bucket = self.locator.bucket(), key, "file already exists");
            return Err(VaultError::ResourceAlreadyExists(format!(
                "the file on the path '{key}' already exists"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for FileHandler {
    fn supported_type(&self) -> ResourceType {
        ResourceType::File
    }

    async fn get_info(&self, context: &ResourceContext) -> Result<ResourceInfo> {
        let size = self.locator.file_size(&context.absolute_key).await?;
        Ok(info_for(context, Some(size)))
    }

    async fn copy(&self, source: &ResourceContext, destination_key: &str) -> Result<()> {
        self.require_exists(&source.absolute_key).await?;
        self.require_absent(destination_key).await?;

        self.locator
            .store()
            .copy(&source.bucket, &source.absolute_key, destination_key)
            .await
            .map_err(|err| store_access_error("copy", &source.absolute_key, err))?;
        info!(
            bucket = %source.bucket,
            source = %source.absolute_key,
            destination = destination_key,
            "copied file"
        );
        Ok(())
    }

    async fn delete(&self, context: &ResourceContext) -> Result<()> {
        self.require_exists(&context.absolute_key).await?;

        self.locator
            .store()
            .remove(&context.bucket, &context.absolute_key)
            .await
            .map_err(|err| store_access_error("remove", &context.absolute_key, err))?;
        info!(bucket = %context.bucket, key = %context.absolute_key, "deleted file");

        self.placeholders
            .ensure_directory_placeholder(parent_path(&context.absolute_key))
            .await?;
        Ok(())
    }

    async fn download(&self, context: &ResourceContext) -> Result<ResourceDownload> {
        let body = self
            .locator
            .store()
            .get(&context.bucket, &context.absolute_key)
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    VaultError::ResourceNotFound(format!(
                        "the file on the path '{}' was not found",
                        context.absolute_key
                    ))
                } else {
                    store_access_error("get", &context.absolute_key, err)
                }
            })?;

        Ok(ResourceDownload {
            file_name: resource_name(&context.absolute_key).to_string(),
            body,
        })
    }
}
