use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use filevault_storage::{
    ByteStream, MemoryObjectStore, ObjectStat, ObjectStore, StoreError,
    error::Result,
    traits::{collect_stream, stream_from_bytes},
};

use crate::locator::{ResourceContext, ResourceLocator, UserRoot};
use crate::placeholder::DirectoryPlaceholderManager;

pub const BUCKET: &str = "user-files";

/// Memory store that counts calls and fails chosen keys on demand.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryObjectStore,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing_removals: Mutex<HashSet<String>>,
    failing_copies: Mutex<HashSet<String>>,
}

impl RecordingStore {
    fn record(&self, operation: &'static str) {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn fail_removal_of(&self, key: &str) {
        self.failing_removals.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_copy_of(&self, key: &str) {
        self.failing_copies.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        self.inner.make_bucket(bucket).await
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat> {
        self.record("stat");
        self.inner.stat(bucket, key).await
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        recursive: bool,
    ) -> Result<Vec<String>> {
        self.record("list");
        self.inner.list(bucket, prefix, delimiter, recursive).await
    }

    async fn put(&self, bucket: &str, key: &str, body: ByteStream, size: u64) -> Result<()> {
        self.record("put");
        self.inner.put(bucket, key, body, size).await
    }

    async fn copy(&self, bucket: &str, src_key: &str, dst_key: &str) -> Result<()> {
        self.record("copy");
        if self.failing_copies.lock().unwrap().contains(src_key) {
            return Err(StoreError::Internal(format!("injected copy failure for {src_key}")));
        }
        self.inner.copy(bucket, src_key, dst_key).await
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        self.record("remove");
        self.inner.remove(bucket, key).await
    }

    async fn bulk_remove(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>> {
        self.record("bulk_remove");
        let failing = self.failing_removals.lock().unwrap().clone();
        let (failed, removable): (Vec<String>, Vec<String>) =
            keys.into_iter().partition(|key| failing.contains(key));
        self.inner.bulk_remove(bucket, removable).await?;
        Ok(failed)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        self.record("get");
        self.inner.get(bucket, key).await
    }
}

pub struct Fixture {
    pub store: Arc<RecordingStore>,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = RecordingStore::default();
        store.make_bucket(BUCKET).await.unwrap();
        Self {
            store: Arc::new(store),
        }
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn locator(&self) -> ResourceLocator {
        ResourceLocator::new(self.object_store(), BUCKET)
    }

    pub fn placeholders(&self) -> DirectoryPlaceholderManager {
        DirectoryPlaceholderManager::new(self.locator())
    }

    pub async fn context(&self, root: &UserRoot, relative_path: &str) -> ResourceContext {
        self.locator().context(root, relative_path).await.unwrap()
    }

    pub async fn put(&self, key: &str, data: &str) {
        self.store
            .put(BUCKET, key, stream_from_bytes(data.to_string()), data.len() as u64)
            .await
            .unwrap();
    }

    pub async fn put_bytes(&self, key: &str, data: Vec<u8>) {
        let size = data.len() as u64;
        self.store
            .put(BUCKET, key, stream_from_bytes(data), size)
            .await
            .unwrap();
    }

    pub async fn read(&self, key: &str) -> String {
        let body = collect_stream(self.store.get(BUCKET, key).await.unwrap())
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        self.store.list(BUCKET, prefix, "/", true).await.unwrap()
    }
}
