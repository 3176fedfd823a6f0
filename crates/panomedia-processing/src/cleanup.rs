//! Bulk removal of the objects derived from a deleted media record.

use panomedia_core::models::{DeleteObjectsPayload, DeleteObjectsResult};
use panomedia_storage::Remover;

#[derive(Clone)]
pub struct ObjectCleaner {
    remover: Remover,
    concurrency: usize,
}

impl ObjectCleaner {
    pub fn new(remover: Remover, concurrency: usize) -> Self {
        Self {
            remover,
            concurrency: concurrency.max(1),
        }
    }

    /// Removes every key in the payload. Failures are counted, not raised, so one
    /// bad key never keeps the rest around.
    #[tracing::instrument(
        skip(self, payload),
        fields(media_id = %payload.media_id, keys = payload.keys.len())
    )]
    pub async fn delete_objects(&self, payload: &DeleteObjectsPayload) -> DeleteObjectsResult {
        let summary = self
            .remover
            .remove_many(&payload.keys, self.concurrency)
            .await;

        if summary.failed.is_empty() {
            tracing::info!(deleted = summary.deleted, "Media objects removed");
        } else {
            tracing::warn!(
                deleted = summary.deleted,
                failed = summary.failed.len(),
                "Some media objects could not be removed"
            );
        }

        DeleteObjectsResult {
            deleted: summary.deleted,
            failed: summary.failed.len(),
        }
    }
}
