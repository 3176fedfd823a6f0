//! Upload and removal wrappers that broadcast transfer events.
//!
//! Events are best effort: a send with no subscribers is dropped.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::broadcast;

use crate::traits::{DeleteSummary, PutOptions, Storage, StorageResult};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Progress {
        key: String,
        bytes_done: u64,
        bytes_total: u64,
    },
    Success {
        key: String,
        url: Option<String>,
    },
    Error {
        key: String,
        message: String,
    },
}

impl TransferEvent {
    pub fn key(&self) -> &str {
        match self {
            TransferEvent::Progress { key, .. }
            | TransferEvent::Success { key, .. }
            | TransferEvent::Error { key, .. } => key,
        }
    }
}

#[derive(Clone)]
pub struct Uploader {
    storage: Arc<dyn Storage>,
    events: broadcast::Sender<TransferEvent>,
}

impl Uploader {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { storage, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub async fn upload(
        &self,
        key: &str,
        data: Bytes,
        options: &PutOptions,
    ) -> StorageResult<String> {
        let total = data.len() as u64;
        let _ = self.events.send(TransferEvent::Progress {
            key: key.to_string(),
            bytes_done: 0,
            bytes_total: total,
        });

        match self.storage.put(key, data, options).await {
            Ok(url) => {
                let _ = self.events.send(TransferEvent::Progress {
                    key: key.to_string(),
                    bytes_done: total,
                    bytes_total: total,
                });
                let _ = self.events.send(TransferEvent::Success {
                    key: key.to_string(),
                    url: Some(url.clone()),
                });
                Ok(url)
            }
            Err(e) => {
                let _ = self.events.send(TransferEvent::Error {
                    key: key.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

#[derive(Clone)]
pub struct Remover {
    storage: Arc<dyn Storage>,
    events: broadcast::Sender<TransferEvent>,
}

impl Remover {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { storage, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }

    pub async fn remove(&self, key: &str) -> StorageResult<()> {
        match self.storage.delete(key).await {
            Ok(()) => {
                let _ = self.events.send(TransferEvent::Success {
                    key: key.to_string(),
                    url: None,
                });
                Ok(())
            }
            Err(e) => {
                let _ = self.events.send(TransferEvent::Error {
                    key: key.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Removes `keys` with at most `concurrency` deletes in flight. Individual
    /// failures are collected rather than aborting the batch.
    pub async fn remove_many(&self, keys: &[String], concurrency: usize) -> DeleteSummary {
        let results: Vec<(String, StorageResult<()>)> = futures::stream::iter(keys.iter().cloned())
            .map(|key: String| async move {
                let result = self.remove(&key).await;
                (key, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut summary = DeleteSummary::default();
        for (key, result) in results {
            match result {
                Ok(()) => summary.deleted += 1,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to delete object");
                    summary.failed.push((key, e.to_string()));
                }
            }
        }
        summary
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::LocalStorage;

    #[tokio::test]
    async fn upload_emits_progress_then_success() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost/media".to_string())
            .await
            .unwrap();
        let uploader = Uploader::new(Arc::new(storage));
        let mut events = uploader.subscribe();

        let url = uploader
            .upload("a/b/c.jpg", Bytes::from_static(b"abc"), &PutOptions::jpeg())
            .await
            .unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            TransferEvent::Progress {
                key: "a/b/c.jpg".to_string(),
                bytes_done: 0,
                bytes_total: 3
            }
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            TransferEvent::Progress { bytes_done: 3, .. }
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            TransferEvent::Success {
                key: "a/b/c.jpg".to_string(),
                url: Some(url)
            }
        );
    }

    #[tokio::test]
    async fn failures_emit_error_events() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(dir.path(), "http://localhost/media".to_string())
                .await
                .unwrap(),
        );
        let remover = Remover::new(storage.clone());
        let mut events = remover.subscribe();

        assert!(remover.remove("../outside").await.is_err());
        let event = events.recv().await.unwrap();
        assert!(matches!(event, TransferEvent::Error { .. }));
        assert_eq!(event.key(), "../outside");

        remover.remove("never/written.jpg").await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            TransferEvent::Success { url: None, .. }
        ));
    }

    #[tokio::test]
    async fn remove_many_collects_failures() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(dir.path(), "http://localhost/media".to_string())
                .await
                .unwrap(),
        );

        let keys: Vec<String> = (0..5)
            .map(|i| format!("m/k/frames/high/d/{}.jpg", i))
            .collect();
        for key in &keys {
            storage
                .put(key, Bytes::from_static(b"x"), &PutOptions::jpeg())
                .await
                .unwrap();
        }
        let mut batch = keys.clone();
        batch.push("../escape".to_string());

        let summary = Remover::new(storage.clone()).remove_many(&batch, 2).await;
        assert_eq!(summary.deleted, 5);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "../escape");
        for key in &keys {
            assert!(!storage.exists(key).await.unwrap());
        }
    }
}
