//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for panomedia_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => panomedia_core::AppError::NotFound(key),
            other => panomedia_core::AppError::Storage(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectAcl {
    #[default]
    PublicRead,
    Private,
}

/// Per-object options for [`Storage::put`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub acl: ObjectAcl,
}

impl PutOptions {
    pub fn public(content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            acl: ObjectAcl::PublicRead,
        }
    }

    pub fn jpeg() -> Self {
        Self::public("image/jpeg")
    }
}

/// Outcome of a bulk delete; individual failures do not abort the batch.
#[derive(Debug, Default)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub failed: Vec<(String, String)>,
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait so that the
/// processing workers never couple to a specific backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key` and return its public URL.
    async fn put(&self, key: &str, data: Bytes, options: &PutOptions) -> StorageResult<String>;

    /// Fetch an object by key
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete an object by key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Public URL an object stored under `key` is served from.
    fn url_for(&self, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
