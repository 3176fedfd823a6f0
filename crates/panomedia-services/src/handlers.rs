//! Job dispatch for the worker side of the queue.
//!
//! Decodes each job's payload by its kind and runs the matching handler. The
//! result is returned as JSON; a handler error becomes an `exception` fault.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use panomedia_core::models::{
    DeleteObjectsPayload, JobKind, MediaType, ProcessMediaPayload, SharePayload,
    VideoConversionPayload,
};
use panomedia_core::Config;
use panomedia_processing::{ImageTileWorker, ObjectCleaner, ShareClient, VideoConverter};
use panomedia_storage::{Remover, Storage, Uploader};
use panomedia_worker::{Job, JobHandlerContext};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Clone)]
pub struct JobHandlers {
    pub tiles: ImageTileWorker,
    pub video: VideoConverter,
    pub share: ShareClient,
    pub cleanup: ObjectCleaner,
}

impl JobHandlers {
    pub fn from_config(config: &Config, storage: Arc<dyn Storage>) -> anyhow::Result<Self> {
        let uploader = Uploader::new(storage.clone());
        Ok(Self {
            tiles: ImageTileWorker::new(uploader.clone(), config.into()),
            video: VideoConverter::from_config(uploader, config),
            share: ShareClient::from_config(config)?,
            cleanup: ObjectCleaner::new(Remover::new(storage), config.delete_concurrency),
        })
    }

    pub async fn handle(&self, job: &Job) -> anyhow::Result<Value> {
        match job.kind {
            JobKind::ProcessPanoPhoto | JobKind::ProcessLivePhoto => {
                let payload: ProcessMediaPayload = decode(job)?;
                let expected = match job.kind {
                    JobKind::ProcessPanoPhoto => MediaType::PanoPhoto,
                    _ => MediaType::LivePhoto,
                };
                if payload.media_type != expected {
                    anyhow::bail!("{} job received a {} payload", job.kind, payload.media_type);
                }
                let result = self.tiles.process(&payload).await?;
                Ok(serde_json::to_value(result)?)
            }
            JobKind::ConvertLivePhotoVideo => {
                let payload: VideoConversionPayload = decode(job)?;
                let result = self.video.convert(&payload).await?;
                Ok(serde_json::to_value(result)?)
            }
            JobKind::ShareMedia => {
                let payload: SharePayload = decode(job)?;
                let result = self.share.share(&payload).await?;
                Ok(serde_json::to_value(result)?)
            }
            JobKind::DeleteObjects => {
                let payload: DeleteObjectsPayload = decode(job)?;
                let result = self.cleanup.delete_objects(&payload).await;
                Ok(serde_json::to_value(result)?)
            }
        }
    }
}

fn decode<P: DeserializeOwned>(job: &Job) -> anyhow::Result<P> {
    serde_json::from_value(job.payload.clone())
        .with_context(|| format!("invalid {} payload", job.kind))
}

#[async_trait]
impl JobHandlerContext for JobHandlers {
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> anyhow::Result<Value> {
        self.handle(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panomedia_storage::LocalStorage;
    use serde_json::json;

    async fn handlers() -> (JobHandlers, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(dir.path(), "http://cdn.test".to_string())
                .await
                .unwrap(),
        );
        let handlers = JobHandlers::from_config(&Config::default(), storage).unwrap();
        (handlers, dir)
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let (handlers, _dir) = handlers().await;
        let err = handlers
            .handle(&Job::new(JobKind::ConvertLivePhotoVideo, json!({ "nope": 1 })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid convertLivePhotoVideo payload"));
    }

    #[tokio::test]
    async fn delete_objects_reports_counts() {
        let (handlers, _dir) = handlers().await;
        let result = handlers
            .handle(&Job::new(
                JobKind::DeleteObjects,
                json!({ "mediaId": "m", "keys": ["m/k/image/high/20240101/m.jpg"] }),
            ))
            .await
            .unwrap();
        assert_eq!(result, json!({ "deleted": 1, "failed": 0 }));
    }
}
