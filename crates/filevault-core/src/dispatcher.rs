use std::collections::HashMap;
use std::sync::Arc;

use filevault_common::{
    error::{Result, VaultError},
    types::{ResourceInfo, ResourceType},
};
use tracing::error;

use crate::handler::{DirectoryHandler, FileHandler, ResourceDownload, ResourceHandler};
use crate::locator::ResourceContext;

/// Routes a context to the handler for its resource type.
#[derive(Clone)]
pub struct ResourceDispatcher {
    handlers: HashMap<ResourceType, Arc<dyn ResourceHandler>>,
}

impl ResourceDispatcher {
    pub fn new(file: FileHandler, directory: DirectoryHandler) -> Self {
        let handlers: [Arc<dyn ResourceHandler>; 2] = [Arc::new(file), Arc::new(directory)];
        Self {
            handlers: handlers
                .into_iter()
                .map(|handler| (handler.supported_type(), handler))
                .collect(),
        }
    }

    pub fn handler(&self, resource_type: ResourceType) -> Result<&dyn ResourceHandler> {
        match self.handlers.get(&resource_type) {
            Some(handler) => Ok(handler.as_ref()),
            None => {
                error!(%resource_type, "no handler registered for resource type");
                Err(VaultError::HandlerNotFound(resource_type))
            }
        }
    }

    pub async fn get_info(&self, context: &ResourceContext) -> Result<ResourceInfo> {
        self.handler(context.resource_type)?.get_info(context).await
    }

    pub async fn copy(&self, source: &ResourceContext, destination_key: &str) -> Result<()> {
        self.handler(source.resource_type)?
            .copy(source, destination_key)
            .await
    }

    pub async fn delete(&self, context: &ResourceContext) -> Result<()> {
        self.handler(context.resource_type)?.delete(context).await
    }

    pub async fn download(&self, context: &ResourceContext) -> Result<ResourceDownload> {
        self.handler(context.resource_type)?.download(context).await
    }
}
