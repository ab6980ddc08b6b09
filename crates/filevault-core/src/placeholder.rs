use filevault_common::error::Result;
use filevault_storage::traits::empty_stream;
use tracing::{debug, info};

use crate::locator::{ResourceLocator, store_access_error};

/// Keeps emulated directories visible by writing zero-byte objects whose key
/// is the directory prefix itself.
#[derive(Clone)]
pub struct DirectoryPlaceholderManager {
    locator: ResourceLocator,
}

impl DirectoryPlaceholderManager {
    pub fn new(locator: ResourceLocator) -> Self {
        Self { locator }
    }

    pub async fn put_empty_directory(&self, prefix: &str) -> Result<()> {
        let store = self.locator.store();
        store
            .put(self.locator.bucket(), prefix, empty_stream(), 0)
            .await
            .map_err(|err| store_access_error("put placeholder", prefix, err))?;
        info!(bucket = self.locator.bucket(), prefix, "wrote directory placeholder");
        Ok(())
    }

    /// Writes a placeholder at `prefix` only when nothing is listed under it.
    /// Returns whether one was written.
    pub async fn ensure_directory_placeholder(&self, prefix: &str) -> Result<bool> {
        if prefix.is_empty() {
            return Ok(false);
        }
        if self.locator.directory_exists(prefix).await? {
            debug!(bucket = self.locator.bucket(), prefix, "directory still listed, no placeholder needed");
            return Ok(false);
        }
        self.put_empty_directory(prefix).await?;
        Ok(true)
    }
}
