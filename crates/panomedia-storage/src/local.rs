use crate::traits::{ObjectAcl, PutOptions, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/panomedia/media")
    /// * `base_url` - Base URL the directory is served from (e.g., "http://localhost:3000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert a storage key to a filesystem path, rejecting keys that escape the
    /// base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        // Existing paths may be symlinks; resolve and re-check containment.
        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        } else if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}-{}.partial", name, std::process::id(), seq))
}

#[cfg(unix)]
async fn apply_acl(path: &Path, acl: ObjectAcl) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = match acl {
        ObjectAcl::PublicRead => 0o644,
        ObjectAcl::Private => 0o600,
    };
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn apply_acl(_path: &Path, _acl: ObjectAcl) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl Storage for LocalStorage {
    /// Writes to a staging file in the target directory and renames it into
    /// place, so readers never observe a partial object.
    async fn put(&self, key: &str, data: Bytes, options: &PutOptions) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        let staging = staging_path(&path);
        let start = std::time::Instant::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let written = async {
            fs::write(&staging, &data).await?;
            apply_acl(&staging, options.acl).await?;
            fs::rename(&staging, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )));
        }

        tracing::debug!(
            key = %key,
            size_bytes = data.len(),
            content_type = options.content_type.as_deref().unwrap_or("-"),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(self.url_for(key))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::DownloadFailed(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:3000/media/".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let key = "AAAA/0a1b/tiles/high/20240101/AAAA_equirectangular_0.jpg";
        let url = storage
            .put(key, Bytes::from_static(b"jpeg"), &PutOptions::jpeg())
            .await
            .unwrap();

        assert_eq!(url, format!("http://localhost:3000/media/{}", key));
        assert_eq!(storage.get(key).await.unwrap(), Bytes::from_static(b"jpeg"));
        assert!(storage.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.get("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert!(storage.delete("nonexistent/file.jpg").await.is_ok());
        assert!(matches!(
            storage.get("nonexistent/file.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_replaces_without_leftovers() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let key = "m/k/image/high/20240101/m.jpg";

        storage
            .put(key, Bytes::from_static(b"first"), &PutOptions::jpeg())
            .await
            .unwrap();
        storage
            .put(key, Bytes::from_static(b"second"), &PutOptions::jpeg())
            .await
            .unwrap();

        assert_eq!(storage.get(key).await.unwrap(), Bytes::from_static(b"second"));
        let parent = dir.path().join("m/k/image/high/20240101");
        let names: Vec<_> = std::fs::read_dir(parent)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("m.jpg")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_private_objects_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let options = PutOptions {
            content_type: Some("video/mp4".to_string()),
            acl: ObjectAcl::Private,
        };
        storage
            .put("m/k/video/high/20240101/m.mp4", Bytes::from_static(b"mp4"), &options)
            .await
            .unwrap();

        let mode = std::fs::metadata(dir.path().join("m/k/video/high/20240101/m.mp4"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
