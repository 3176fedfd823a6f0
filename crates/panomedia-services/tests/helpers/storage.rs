//! Storage doubles.

use async_trait::async_trait;
use bytes::Bytes;
use panomedia_storage::{PutOptions, Storage, StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Delegates to `inner` but rejects uploads whose key contains `fail_on`.
pub struct FailingStorage {
    inner: Arc<dyn Storage>,
    fail_on: String,
    rejected: AtomicUsize,
}

impl FailingStorage {
    pub fn new(inner: Arc<dyn Storage>, fail_on: &str) -> Self {
        Self {
            inner,
            fail_on: fail_on.to_string(),
            rejected: AtomicUsize::new(0),
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn put(&self, key: &str, data: Bytes, options: &PutOptions) -> StorageResult<String> {
        if key.contains(&self.fail_on) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::UploadFailed(format!("rejected {}", key)));
        }
        self.inner.put(key, data, options).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    fn url_for(&self, key: &str) -> String {
        self.inner.url_for(key)
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
