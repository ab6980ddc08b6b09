use async_trait::async_trait;
use filevault_common::{
    error::Result,
    types::{ResourceInfo, ResourceType},
};
use filevault_storage::ByteStream;

use crate::keys::{parent_path, resource_name};
use crate::locator::ResourceContext;

pub mod directory;
pub mod file;

pub use directory::DirectoryHandler;
pub use file::FileHandler;

/// Name to offer the client plus the streamed body.
pub struct ResourceDownload {
    pub file_name: String,
    pub body: ByteStream,
}

impl std::fmt::Debug for ResourceDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDownload")
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// Type-specific behavior behind [`crate::ResourceDispatcher`].
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn supported_type(&self) -> ResourceType;

    async fn get_info(&self, context: &ResourceContext) -> Result<ResourceInfo>;

    /// Copies `source` to `destination_key`, which must already carry the
    /// owning user's root prefix.
    async fn copy(&self, source: &ResourceContext, destination_key: &str) -> Result<()>;

    async fn delete(&self, context: &ResourceContext) -> Result<()>;

    async fn download(&self, context: &ResourceContext) -> Result<ResourceDownload>;
}

fn info_for(context: &ResourceContext, size: Option<u64>) -> ResourceInfo {
    ResourceInfo {
        parent_path: parent_path(&context.relative_path).to_string(),
        name: resource_name(&context.relative_path).to_string(),
        size,
        resource_type: context.resource_type,
    }
}
