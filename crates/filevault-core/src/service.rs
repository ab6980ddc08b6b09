//! Per-user operations over the hierarchical view.
//!
//! Every entry point validates its input before touching the store, builds
//! keys only through [`UserRoot`], and hands type-specific work to the
//! [`ResourceDispatcher`]. Results are expressed in paths relative to the
//! user's root.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use filevault_common::{
    error::{Result, VaultError},
    types::{ResourceInfo, ResourceType},
};
use filevault_storage::{ByteStream, ObjectStore};
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::dispatcher::ResourceDispatcher;
use crate::handler::{DirectoryHandler, FileHandler, ResourceDownload};
use crate::keys::{ancestor_directories, is_directory_path, parent_path, resource_name};
use crate::locator::{ResourceLocator, UserRoot, store_access_error};
use crate::placeholder::DirectoryPlaceholderManager;
use crate::validation;

/// One file of an upload request. `file_name` may contain sub-directories.
pub struct Upload {
    pub file_name: String,
    pub size: u64,
    pub body: ByteStream,
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct UserFileService {
    locator: ResourceLocator,
    placeholders: DirectoryPlaceholderManager,
    dispatcher: ResourceDispatcher,
    max_upload_size: u64,
    max_request_size: u64,
}

impl UserFileService {
    pub fn new(store: Arc<dyn ObjectStore>, config: CoreConfig) -> Self {
        let locator = ResourceLocator::new(store, config.bucket);
        let placeholders = DirectoryPlaceholderManager::new(locator.clone());
        let dispatcher = ResourceDispatcher::new(
            FileHandler::new(locator.clone(), placeholders.clone()),
            DirectoryHandler::new(locator.clone(), placeholders.clone(), config.copy_concurrency),
        );
        Self {
            locator,
            placeholders,
            dispatcher,
            max_upload_size: config.max_upload_size,
            max_request_size: config.max_request_size,
        }
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    pub fn max_request_size(&self) -> u64 {
        self.max_request_size
    }

    pub async fn get_resource_info(&self, user_id: u64, path: &str) -> Result<ResourceInfo> {
        validation::validate_path_format(path)?;
        let root = UserRoot::new(user_id);
        let context = self.locator.context(&root, path).await?;
        self.dispatcher.get_info(&context).await
    }

    /// Direct children of `path`, `""` being the root. The directory's own
    /// placeholder is not listed.
    pub async fn get_directory_info(&self, user_id: u64, path: &str) -> Result<Vec<ResourceInfo>> {
        validation::validate_directory_path_format(path)?;
        let root = UserRoot::new(user_id);
        let prefix = root.absolute_key(path);

        let keys = self.locator.list_direct(&prefix).await?;
        if keys.is_empty() && !path.is_empty() {
            warn!(user_id, path, "directory does not exist");
            return Err(VaultError::DirectoryNotFound(format!(
                "the directory on the path '{path}' was not found"
            )));
        }

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys.iter().filter(|key| **key != prefix) {
            let relative = root.relative_path(key)?;
            entries.push(self.describe(&root, relative).await?);
        }
        debug!(user_id, path, entries = entries.len(), "listed directory");
        Ok(entries)
    }

    /// Files and directories anywhere under the root whose name contains
    /// `query`, ignoring case. Directories are derived from key prefixes, so
    /// ones without a placeholder are found too.
    pub async fn search_resources(&self, user_id: u64, query: &str) -> Result<Vec<ResourceInfo>> {
        validation::validate_search_query_format(query)?;
        let root = UserRoot::new(user_id);
        let needle = query.to_lowercase();

        let keys = self.locator.list_recursive(root.prefix()).await?;
        let mut paths = BTreeSet::new();
        for key in &keys {
            let relative = root.relative_path(key)?;
            if relative.is_empty() {
                continue;
            }
            paths.extend(ancestor_directories(relative));
            paths.insert(relative);
        }

        let mut found = Vec::new();
        for relative in paths {
            if resource_name(relative).to_lowercase().contains(&needle) {
                found.push(self.describe(&root, relative).await?);
            }
        }
        debug!(user_id, query, matches = found.len(), "searched resources");
        Ok(found)
    }

    pub async fn create_empty_directory(&self, user_id: u64, path: &str) -> Result<ResourceInfo> {
        validation::validate_create_directory_path_format(path)?;
        let root = UserRoot::new(user_id);

        let parent = parent_path(path);
        if !parent.is_empty() && !self.locator.directory_exists(&root.absolute_key(parent)).await? {
            warn!(user_id, path, parent, "parent directory does not exist");
            return Err(VaultError::DirectoryNotFound(format!(
                "the parent directory '{parent}' was not found"
            )));
        }

        let prefix = root.absolute_key(path);
        if self.locator.directory_exists(&prefix).await? {
            warn!(user_id, path, "directory already exists");
            return Err(VaultError::ResourceAlreadyExists(format!(
                "the directory on the path '{path}' already exists"
            )));
        }

        self.placeholders.put_empty_directory(&prefix).await?;
        info!(user_id, path, "created directory");
        Ok(ResourceInfo::directory(parent, resource_name(path)))
    }

    pub async fn create_user_root_directory(&self, user_id: u64) -> Result<()> {
        let root = UserRoot::new(user_id);
        if self.locator.directory_exists(root.prefix()).await? {
            warn!(user_id, "user root directory already exists");
            return Err(VaultError::ResourceAlreadyExists(format!(
                "the root directory of user {user_id} already exists"
            )));
        }
        self.placeholders.put_empty_directory(root.prefix()).await?;
        info!(user_id, "created user root directory");
        Ok(())
    }

    pub async fn upload_resource(
        &self,
        user_id: u64,
        directory: &str,
        upload: Upload,
    ) -> Result<ResourceInfo> {
        let mut uploaded = self.upload_resources(user_id, directory, vec![upload]).await?;
        uploaded.pop().ok_or_else(|| {
            VaultError::ObjectStoreAccess("upload finished without a result".to_string())
        })
    }

    /// Checks every file first, then streams them to the store in order.
    /// A store failure midway leaves the earlier files in place.
    pub async fn upload_resources(
        &self,
        user_id: u64,
        directory: &str,
        uploads: Vec<Upload>,
    ) -> Result<Vec<ResourceInfo>> {
        validation::validate_directory_path_format(directory)?;
        let targets = self.check_uploads(user_id, directory, &uploads)?;

        let root = UserRoot::new(user_id);
        if !directory.is_empty()
            && !self.locator.directory_exists(&root.absolute_key(directory)).await?
        {
            warn!(user_id, directory, "upload target directory does not exist");
            return Err(VaultError::DirectoryNotFound(format!(
                "the directory on the path '{directory}' was not found"
            )));
        }

        for relative in &targets {
            if self.locator.file_exists(&root.absolute_key(relative)).await? {
                warn!(user_id, path = %relative, "upload target already exists");
                return Err(VaultError::ResourceAlreadyExists(format!(
                    "the file on the path '{relative}' already exists"
                )));
            }
        }

        let store = self.locator.store();
        let mut infos = Vec::with_capacity(uploads.len());
        for (upload, relative) in uploads.into_iter().zip(targets) {
            let key = root.absolute_key(&relative);
            store
                .put(self.locator.bucket(), &key, upload.body, upload.size)
                .await
                .map_err(|err| store_access_error("put", &key, err))?;
            info!(user_id, path = %relative, size = upload.size, "uploaded file");
            infos.push(ResourceInfo::file(
                parent_path(&relative),
                resource_name(&relative),
                upload.size,
            ));
        }
        Ok(infos)
    }

    /// Grammar, size and duplicate checks. Returns each file's relative path.
    fn check_uploads(&self, user_id: u64, directory: &str, uploads: &[Upload]) -> Result<Vec<String>> {
        let mut names = HashSet::with_capacity(uploads.len());
        for upload in uploads {
            validation::validate_upload_file_name(&upload.file_name)?;
            validation::validate_upload_size(upload.size, self.max_upload_size)?;
            if !names.insert(upload.file_name.as_str()) {
                warn!(user_id, directory, file_name = %upload.file_name, "duplicate file in upload");
                return Err(VaultError::ResourceAlreadyExists(format!(
                    "the file '{}' appears more than once in the upload",
                    upload.file_name
                )));
            }
        }
        let total = uploads.iter().map(|upload| upload.size).sum();
        validation::validate_upload_size(total, self.max_request_size)?;
        Ok(uploads
            .iter()
            .map(|upload| format!("{directory}{}", upload.file_name))
            .collect())
    }

    /// Copy, then delete the source. Not atomic: a failure after the copy
    /// leaves both trees in place.
    pub async fn move_resource(&self, user_id: u64, from: &str, to: &str) -> Result<ResourceInfo> {
        validation::validate_move_paths_format(from, to)?;
        if from.is_empty() || to.is_empty() {
            info!(user_id, from, to, "rejected move of the root directory");
            return Err(VaultError::InvalidPathFormat(
                "the root directory cannot be moved".to_string(),
            ));
        }
        if is_directory_path(from) && to.starts_with(from) {
            info!(user_id, from, to, "rejected move of a directory into itself");
            return Err(VaultError::InvalidPathFormat(format!(
                "the directory '{from}' cannot be moved into itself"
            )));
        }

        let root = UserRoot::new(user_id);
        let source = self.locator.context(&root, from).await?;
        self.dispatcher.copy(&source, &root.absolute_key(to)).await?;
        self.dispatcher.delete(&source).await?;
        info!(user_id, from, to, resource_type = %source.resource_type, "moved resource");

        let destination = self.locator.context(&root, to).await?;
        self.dispatcher.get_info(&destination).await
    }

    pub async fn download_resource(&self, user_id: u64, path: &str) -> Result<ResourceDownload> {
        validation::validate_path_format(path)?;
        let root = UserRoot::new(user_id);
        let context = self.locator.context(&root, path).await?;
        let download = self.dispatcher.download(&context).await?;
        info!(user_id, path, file_name = %download.file_name, "started download");
        Ok(download)
    }

    pub async fn delete_resource(&self, user_id: u64, path: &str) -> Result<()> {
        validation::validate_path_format(path)?;
        if path.is_empty() {
            info!(user_id, "rejected delete of the root directory");
            return Err(VaultError::InvalidPathFormat(
                "the root directory cannot be deleted".to_string(),
            ));
        }
        let root = UserRoot::new(user_id);
        let context = self.locator.context(&root, path).await?;
        self.dispatcher.delete(&context).await?;
        info!(user_id, path, resource_type = %context.resource_type, "deleted resource");
        Ok(())
    }

    /// Info for a path that a listing just returned, without re-resolving
    /// its type.
    async fn describe(&self, root: &UserRoot, relative: &str) -> Result<ResourceInfo> {
        match ResourceType::from_path(relative) {
            ResourceType::Directory => Ok(ResourceInfo::directory(
                parent_path(relative),
                resource_name(relative),
            )),
            ResourceType::File => {
                let size = self.locator.file_size(&root.absolute_key(relative)).await?;
                Ok(ResourceInfo::file(parent_path(relative), resource_name(relative), size))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use filevault_common::{VaultError, types::ResourceType};
    use filevault_storage::traits::{collect_stream, stream_from_bytes};

    use super::{Upload, UserFileService};
    use crate::config::CoreConfig;
    use crate::testing::Fixture;

    const USER: u64 = 7;

    fn service(fixture: &Fixture) -> UserFileService {
        UserFileService::new(fixture.object_store(), CoreConfig::default())
    }

    fn upload(name: &str, data: &str) -> Upload {
        Upload {
            file_name: name.to_string(),
            size: data.len() as u64,
            body: stream_from_bytes(data.to_string()),
        }
    }

    /// Root `user-7-files/` holding `a/`, `a/b/` and `a/b/x.txt` = "hi".
    async fn scenario() -> (Fixture, UserFileService) {
        let fixture = Fixture::new().await;
        let service = service(&fixture);
        service.create_user_root_directory(USER).await.unwrap();
        service.create_empty_directory(USER, "a/").await.unwrap();
        service.create_empty_directory(USER, "a/b/").await.unwrap();
        service
            .upload_resource(USER, "a/b/", upload("x.txt", "hi"))
            .await
            .unwrap();
        (fixture, service)
    }

    #[tokio::test]
    async fn directory_listing_and_file_info() {
        let (_fixture, service) = scenario().await;

        let listing = service.get_directory_info(USER, "a/").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "b");
        assert_eq!(listing[0].parent_path, "a/");
        assert_eq!(listing[0].resource_type, ResourceType::Directory);
        assert_eq!(listing[0].size, None);

        let info = service.get_resource_info(USER, "a/b/x.txt").await.unwrap();
        assert_eq!(info.size, Some(2));
        assert_eq!(info.resource_type, ResourceType::File);
    }

    #[tokio::test]
    async fn moving_the_last_file_keeps_its_directory() {
        let (_fixture, service) = scenario().await;

        let moved = service
            .move_resource(USER, "a/b/x.txt", "a/y.txt")
            .await
            .unwrap();
        assert_eq!(moved.name, "y.txt");
        assert_eq!(moved.size, Some(2));

        assert_eq!(
            service.get_resource_info(USER, "a/y.txt").await.unwrap().size,
            Some(2)
        );
        assert!(matches!(
            service.get_resource_info(USER, "a/b/x.txt").await,
            Err(VaultError::ResourceNotFound(_))
        ));
        let dir = service.get_resource_info(USER, "a/b/").await.unwrap();
        assert_eq!(dir.resource_type, ResourceType::Directory);
    }

    #[tokio::test]
    async fn moving_a_directory_preserves_its_tree() {
        let (fixture, service) = scenario().await;
        service
            .upload_resource(USER, "a/b/", upload("deep/z.txt", "zz"))
            .await
            .unwrap();

        let moved = service.move_resource(USER, "a/b/", "c/").await.unwrap();
        assert_eq!(moved.resource_type, ResourceType::Directory);
        assert_eq!(moved.name, "c");

        assert_eq!(
            fixture.keys("user-7-files/c/").await,
            vec![
                "user-7-files/c/",
                "user-7-files/c/deep/z.txt",
                "user-7-files/c/x.txt",
            ]
        );
        assert_eq!(fixture.read("user-7-files/c/deep/z.txt").await, "zz");
        assert!(matches!(
            service.get_resource_info(USER, "a/b/").await,
            Err(VaultError::ResourceNotFound(_))
        ));
        // `a/` lost its only child and keeps its own placeholder.
        assert!(service.get_directory_info(USER, "a/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn move_rejects_mixed_kinds_and_self_nesting() {
        let (fixture, service) = scenario().await;
        let before = fixture.store.total_calls();

        assert!(matches!(
            service.move_resource(USER, "a/b/x.txt", "a/b/").await,
            Err(VaultError::InvalidPathFormat(_))
        ));
        assert!(matches!(
            service.move_resource(USER, "a/", "a/b/inner/").await,
            Err(VaultError::InvalidPathFormat(_))
        ));
        assert_eq!(fixture.store.total_calls(), before);
    }

    #[tokio::test]
    async fn move_onto_existing_target_conflicts() {
        let (_fixture, service) = scenario().await;
        service
            .upload_resource(USER, "a/", upload("y.txt", "taken"))
            .await
            .unwrap();

        assert!(matches!(
            service.move_resource(USER, "a/b/x.txt", "a/y.txt").await,
            Err(VaultError::ResourceAlreadyExists(_))
        ));
        // Nothing was deleted.
        assert!(service.get_resource_info(USER, "a/b/x.txt").await.is_ok());
    }

    #[tokio::test]
    async fn creating_an_existing_directory_conflicts() {
        let (_fixture, service) = scenario().await;
        assert!(matches!(
            service.create_empty_directory(USER, "a/").await,
            Err(VaultError::ResourceAlreadyExists(_))
        ));
        assert!(matches!(
            service.create_user_root_directory(USER).await,
            Err(VaultError::ResourceAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn creating_under_a_missing_parent_fails() {
        let (_fixture, service) = scenario().await;
        assert!(matches!(
            service.create_empty_directory(USER, "missing/child/").await,
            Err(VaultError::DirectoryNotFound(_))
        ));

        let info = service.create_empty_directory(USER, "a/new dir/").await.unwrap();
        assert_eq!(info.parent_path, "a/");
        assert_eq!(info.name, "new dir");
    }

    #[tokio::test]
    async fn delete_empties_the_directory() {
        let (fixture, service) = scenario().await;
        service.delete_resource(USER, "a/").await.unwrap();

        assert!(fixture.keys("user-7-files/a/").await.is_empty());
        assert!(service.get_directory_info(USER, "").await.unwrap().is_empty());
        assert!(matches!(
            service.delete_resource(USER, "").await,
            Err(VaultError::InvalidPathFormat(_))
        ));
    }

    #[tokio::test]
    async fn uploads_are_checked_before_anything_is_written() {
        let (fixture, service) = scenario().await;

        let err = service
            .upload_resources(
                USER,
                "a/",
                vec![upload("new.txt", "n"), upload("b/x.txt", "dup")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::ResourceAlreadyExists(_)));
        assert!(fixture.keys("user-7-files/a/new.txt").await.is_empty());

        let err = service
            .upload_resources(USER, "a/", vec![upload("n.txt", "1"), upload("n.txt", "2")])
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::ResourceAlreadyExists(_)));

        assert!(matches!(
            service.upload_resource(USER, "nope/", upload("f.txt", "f")).await,
            Err(VaultError::DirectoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let fixture = Fixture::new().await;
        let config = CoreConfig {
            max_upload_size: 4,
            ..CoreConfig::default()
        };
        let service = UserFileService::new(fixture.object_store(), config);

        let err = service
            .upload_resource(USER, "", upload("big.bin", "12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::UploadTooLarge { size: 5, max_size: 4 }));
        assert_eq!(fixture.store.total_calls(), 0);
    }

    #[tokio::test]
    async fn request_total_is_capped() {
        let fixture = Fixture::new().await;
        let config = CoreConfig {
            max_upload_size: 4,
            max_request_size: 6,
            ..CoreConfig::default()
        };
        let service = UserFileService::new(fixture.object_store(), config);

        let err = service
            .upload_resources(USER, "", vec![upload("a.bin", "1234"), upload("b.bin", "1234")])
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::UploadTooLarge { size: 8, max_size: 6 }));
        assert_eq!(fixture.store.total_calls(), 0);
    }

    #[tokio::test]
    async fn search_matches_names_case_insensitively() {
        let (_fixture, service) = scenario().await;
        service
            .upload_resource(USER, "a/", upload("Notes.TXT", "n"))
            .await
            .unwrap();

        let found = service.search_resources(USER, "x").await.unwrap();
        let names: Vec<&str> = found.iter().map(|info| info.name.as_str()).collect();
        assert_eq!(names, vec!["Notes.TXT", "x.txt"]);

        let found = service.search_resources(USER, "B").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].resource_type, ResourceType::Directory);
        assert_eq!(found[0].parent_path, "a/");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn downloads_files_and_directories() {
        let (_fixture, service) = scenario().await;

        let file = service.download_resource(USER, "a/b/x.txt").await.unwrap();
        assert_eq!(file.file_name, "x.txt");
        assert_eq!(&collect_stream(file.body).await.unwrap()[..], b"hi");

        let dir = service.download_resource(USER, "a/").await.unwrap();
        assert_eq!(dir.file_name, "a.zip");
        let bytes = collect_stream(dir.body).await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["b/", "b/x.txt"]);
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_any_store_call() {
        let fixture = Fixture::new().await;
        let service = service(&fixture);
        let escape = "../escape";

        let results = [
            service.get_resource_info(USER, escape).await.err(),
            service.get_directory_info(USER, escape).await.err(),
            service.search_resources(USER, escape).await.err(),
            service.create_empty_directory(USER, escape).await.err(),
            service.move_resource(USER, escape, "ok.txt").await.err(),
            service.move_resource(USER, "ok.txt", escape).await.err(),
            service.download_resource(USER, escape).await.err(),
            service.delete_resource(USER, escape).await.err(),
            service
                .upload_resource(USER, "", upload(escape, "x"))
                .await
                .err(),
            service
                .upload_resource(USER, "../", upload("x.txt", "x"))
                .await
                .err(),
        ];
        for result in results {
            assert!(matches!(result, Some(VaultError::InvalidPathFormat(_))));
        }
        assert_eq!(fixture.store.total_calls(), 0);
    }
}
