//! Media processing orchestrator.
//!
//! The request path validates an upload, persists a `pending` record and returns
//! the new id right away. Processing happens in a background task per
//! submission: the task submits the job selected by the media type, waits for
//! its single outcome and applies it with one conditional write, so a record
//! leaves `pending` exactly once. Callers observe the result by polling
//! [`MediaOrchestrator::find_media`].
//!
//! A submission whose task never finishes (process crash, lost reply) leaves the
//! record `pending`; nothing sweeps such records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use panomedia_core::models::{
    encode_buffer, DeleteObjectsPayload, ImagePayload, MediaContent, MediaRecord, MediaStatus,
    MediaType, NewLocation, NewMediaRecord, ProcessMediaPayload, ProcessingOutcome,
    ProcessingResult, SharePayload, ShareTarget, ThumbnailPayload, VideoConversionPayload,
    VideoConversionResult, VideoOutcome, VideoStatus,
};
use panomedia_core::{AppError, Config, ShardingKeyGenerator, SnowflakeGenerator, SystemClock};
use panomedia_db::Stores;
use panomedia_processing::VIDEO_FORMAT;
use panomedia_storage::{MediaObjectLayout, Storage};
use panomedia_worker::{JobFault, JobQueueClient, JobQueueClientExt};
use tokio_util::task::TaskTracker;

use crate::request::{LocationInput, SubmitResponse, UploadRequest, VideoStatusView};
use crate::validation::validate_upload;

const MEDIA: &str = "media";

/// Where processed objects are served from.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Public base URL for CDN links; falls back to the object store URL.
    pub cdn_base_url: Option<String>,
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            cdn_base_url: config.cdn_base_url.clone(),
        }
    }
}

pub struct MediaOrchestrator {
    stores: Stores,
    ids: SnowflakeGenerator<SystemClock>,
    sharding: ShardingKeyGenerator,
    jobs: Arc<dyn JobQueueClient>,
    storage: Arc<dyn Storage>,
    config: OrchestratorConfig,
    tasks: TaskTracker,
}

impl MediaOrchestrator {
    pub fn new(
        stores: Stores,
        ids: SnowflakeGenerator<SystemClock>,
        sharding: ShardingKeyGenerator,
        jobs: Arc<dyn JobQueueClient>,
        storage: Arc<dyn Storage>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            stores,
            ids,
            sharding,
            jobs,
            storage,
            config,
            tasks: TaskTracker::new(),
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Validates and persists an upload, then starts processing in the background.
    #[tracing::instrument(
        skip(self, request),
        fields(media_type = %media_type, owner_id = %request.owner_id)
    )]
    pub async fn submit_for_processing(
        self: &Arc<Self>,
        media_type: MediaType,
        request: UploadRequest,
    ) -> Result<SubmitResponse, AppError> {
        let upload = validate_upload(media_type, &request)?;
        let location_id = self.resolve_location(request.location.as_ref()).await?;

        let generated = self.ids.next().await;
        let created = DateTime::<Utc>::from_timestamp_millis(generated.timestamp)
            .ok_or_else(|| AppError::Internal("id timestamp out of range".to_string()))?;
        let sharding_key = self.sharding.generate();

        let record = self
            .stores
            .media
            .create(NewMediaRecord {
                id: generated.id,
                media_type,
                dimension: upload.dimension,
                sharding_key: sharding_key.clone(),
                owner_id: request.owner_id,
                location_id,
                caption: request.caption.unwrap_or_default(),
                tags: request.tags,
                created,
            })
            .await?;

        let payload = ProcessMediaPayload {
            media_type,
            media_id: record.id.clone(),
            sharding_key,
            image: ImagePayload {
                width: upload.dimension.width(),
                height: upload.dimension.height(),
                buffer: encode_buffer(&upload.image),
                has_zipped: upload.has_zipped,
                img_arr_boundary: upload.img_arr_boundary,
            },
            thumbnail: ThumbnailPayload {
                buffer: encode_buffer(&upload.thumbnail),
            },
            share: request.share,
        };

        tracing::info!(
            media_id = %record.id,
            sharding_key = %record.sharding_key,
            "Media accepted for processing"
        );

        let this = Arc::clone(self);
        self.tasks.spawn(async move {
            this.run_processing(payload).await;
        });

        Ok(SubmitResponse {
            media_id: record.id,
        })
    }

    #[tracing::instrument(
        skip(self, payload),
        fields(media_id = %payload.media_id, job = %payload.media_type.processing_job())
    )]
    async fn run_processing(self: Arc<Self>, payload: ProcessMediaPayload) {
        let started = std::time::Instant::now();
        let result = self.jobs.submit(&payload).await;
        tracing::debug!(
            duration_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Processing job returned"
        );

        match self.complete_processing(&payload.media_id, result).await {
            Ok(Some(record)) => self.share(&record, &payload.share),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to record processing outcome");
            }
        }
    }

    /// Applies a processing job's outcome to its record.
    ///
    /// Returns the completed record when this call moved it to `completed`, and
    /// `None` when the record failed or had already left `pending`.
    pub async fn complete_processing(
        &self,
        media_id: &str,
        result: Result<ProcessingResult, JobFault>,
    ) -> Result<Option<MediaRecord>, AppError> {
        let record = self.find_media(media_id).await?;

        let outcome = match result {
            Ok(result) if result.media_type() == record.media_type => {
                ProcessingOutcome::Completed(self.content_for(&record, result))
            }
            Ok(result) => ProcessingOutcome::Failed {
                reason: format!(
                    "{} job reported a {} result",
                    record.media_type,
                    result.media_type()
                ),
            },
            Err(fault) => ProcessingOutcome::Failed {
                reason: fault.to_string(),
            },
        };

        if let ProcessingOutcome::Failed { reason } = &outcome {
            tracing::warn!(media_id = %media_id, reason = %reason, "Media processing failed");
        }

        let completed = matches!(outcome, ProcessingOutcome::Completed(_));
        if !self.stores.media.finish(media_id, outcome).await? {
            tracing::debug!(media_id = %media_id, "Record already terminal, outcome dropped");
            return Ok(None);
        }

        if !completed {
            return Ok(None);
        }
        tracing::info!(media_id = %media_id, "Media processing completed");
        self.stores.media.find_by_id(media_id).await
    }

    fn content_for(&self, record: &MediaRecord, result: ProcessingResult) -> MediaContent {
        let prefix = self.layout(record).prefix();
        let store_url = self.storage.url_for(&prefix);
        let cdn_url = match &self.config.cdn_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), prefix),
            None => store_url.clone(),
        };
        MediaContent {
            sharding_key: record.sharding_key.clone(),
            store_url,
            cdn_url,
            result,
        }
    }

    fn layout(&self, record: &MediaRecord) -> MediaObjectLayout {
        MediaObjectLayout::new(&record.id, &record.sharding_key, record.created)
    }

    /// One fire-and-forget share job per target. Failures are only logged.
    fn share(&self, record: &MediaRecord, targets: &[ShareTarget]) {
        let Some(content) = &record.content else {
            return;
        };

        for target in targets {
            let payload = SharePayload {
                media_id: record.id.clone(),
                provider: target.name.clone(),
                access_token: target.access_token.clone(),
                link: content.cdn_url.clone(),
                caption: record.caption.clone(),
            };
            let jobs = self.jobs.clone();
            self.tasks.spawn(async move {
                match jobs.submit(&payload).await {
                    Ok(result) => tracing::info!(
                        media_id = %payload.media_id,
                        provider = %result.provider,
                        post_id = ?result.post_id,
                        "Media shared"
                    ),
                    Err(fault) => tracing::warn!(
                        media_id = %payload.media_id,
                        provider = %payload.provider,
                        fault = %fault,
                        "Share job failed"
                    ),
                }
            });
        }
    }

    async fn resolve_location(
        &self,
        location: Option<&LocationInput>,
    ) -> Result<Option<i64>, AppError> {
        let Some(input) = location else {
            return Ok(None);
        };
        let name = input.name.clone().unwrap_or_default();

        let location = match (&input.provider, &input.provider_id) {
            (Some(provider), Some(provider_id)) => {
                self.stores
                    .locations
                    .find_or_create_by_provider(NewLocation {
                        name,
                        provider: Some(provider.clone()),
                        provider_id: Some(provider_id.clone()),
                        lat: input.lat,
                        lng: input.lng,
                    })
                    .await?
            }
            _ if !name.trim().is_empty() => {
                self.stores
                    .locations
                    .create(NewLocation {
                        name,
                        lat: input.lat,
                        lng: input.lng,
                        ..Default::default()
                    })
                    .await?
            }
            _ => return Ok(None),
        };

        Ok(Some(location.id))
    }

    pub async fn find_media(&self, media_id: &str) -> Result<MediaRecord, AppError> {
        self.stores
            .media
            .find_by_id(media_id)
            .await?
            .ok_or_else(|| AppError::not_found(MEDIA))
    }

    /// Starts converting a completed live photo's frames to a video.
    ///
    /// A conversion that is already pending or completed is reported as is.
    #[tracing::instrument(skip(self))]
    pub async fn request_video_conversion(
        self: &Arc<Self>,
        media_id: &str,
    ) -> Result<VideoStatus, AppError> {
        let record = self.find_media(media_id).await?;
        let frame_count = match (&record.media_type, &record.status, &record.content) {
            (MediaType::LivePhoto, MediaStatus::Completed, Some(content)) => {
                match &content.result {
                    ProcessingResult::LivePhoto { count, .. } => *count,
                    ProcessingResult::PanoPhoto { .. } => {
                        return Err(AppError::not_found(MEDIA))
                    }
                }
            }
            _ => return Err(AppError::not_found(MEDIA)),
        };

        let status = record.video_status();
        if matches!(status, VideoStatus::Pending | VideoStatus::Completed) {
            return Ok(status);
        }

        if !self.stores.media.begin_video(media_id).await? {
            // Another request started the conversion first.
            return Ok(self.find_media(media_id).await?.video_status());
        }

        let payload = VideoConversionPayload {
            media_id: record.id.clone(),
            sharding_key: record.sharding_key.clone(),
            frame_count,
        };
        let this = Arc::clone(self);
        self.tasks.spawn(async move {
            let result = this.jobs.submit(&payload).await;
            if let Err(e) = this
                .complete_video_conversion(&payload.media_id, result)
                .await
            {
                tracing::error!(
                    media_id = %payload.media_id,
                    error = %e,
                    "Failed to record video conversion outcome"
                );
            }
        });

        tracing::info!(media_id = %media_id, frames = frame_count, "Video conversion requested");
        Ok(VideoStatus::Pending)
    }

    /// Applies a conversion job's outcome. Returns whether it was recorded.
    pub async fn complete_video_conversion(
        &self,
        media_id: &str,
        result: Result<VideoConversionResult, JobFault>,
    ) -> Result<bool, AppError> {
        let outcome = match result {
            Ok(VideoConversionResult { format, store_url }) => {
                VideoOutcome::Completed { format, store_url }
            }
            Err(fault) => {
                tracing::warn!(media_id = %media_id, fault = %fault, "Video conversion failed");
                VideoOutcome::Failed {
                    reason: fault.to_string(),
                }
            }
        };
        self.stores.media.finish_video(media_id, outcome).await
    }

    pub async fn get_video_status(&self, media_id: &str) -> Result<VideoStatusView, AppError> {
        let record = self.find_media(media_id).await?;
        let video = record.video.unwrap_or_default();
        Ok(VideoStatusView {
            video_status: video.status,
            video_type: video.format,
            store_url: video.store_url,
        })
    }

    /// Likes a media record. Liking twice leaves a single like.
    pub async fn like(&self, media_id: &str, user_id: &str) -> Result<(), AppError> {
        self.find_media(media_id).await?;
        if self.stores.likes.find(media_id, user_id).await?.is_none() {
            // The store's unique key absorbs a concurrent duplicate.
            self.stores.likes.create(media_id, user_id).await?;
        }
        Ok(())
    }

    /// Removes every like of `user_id` on the record. Unliking twice is a no-op.
    pub async fn unlike(&self, media_id: &str, user_id: &str) -> Result<(), AppError> {
        let removed = self.stores.likes.delete_all(media_id, user_id).await?;
        tracing::debug!(media_id = %media_id, removed, "Likes removed");
        Ok(())
    }

    pub async fn like_count(&self, media_id: &str) -> Result<i64, AppError> {
        self.stores.likes.count(media_id).await
    }

    /// Every object key derived from `record`.
    pub fn derived_keys(&self, record: &MediaRecord) -> Vec<String> {
        let layout = self.layout(record);
        match record.media_type {
            MediaType::PanoPhoto => layout.pano_keys(),
            MediaType::LivePhoto => {
                let frames = match record.content.as_ref().map(|c| &c.result) {
                    Some(ProcessingResult::LivePhoto { count, .. }) => *count,
                    _ => 0,
                };
                let format = record
                    .video
                    .as_ref()
                    .and_then(|v| v.format.as_deref())
                    .unwrap_or(VIDEO_FORMAT);
                layout.live_keys(frames, format)
            }
        }
    }

    /// Deletion hook: submits one bulk delete for every derived object.
    ///
    /// The job runs in the background; its outcome is only logged.
    #[tracing::instrument(skip(self))]
    pub async fn on_before_delete(&self, media_id: &str) -> Result<(), AppError> {
        let record = self.find_media(media_id).await?;
        let payload = DeleteObjectsPayload {
            media_id: record.id.clone(),
            keys: self.derived_keys(&record),
        };

        let jobs = self.jobs.clone();
        self.tasks.spawn(async move {
            match jobs.submit(&payload).await {
                Ok(result) => tracing::info!(
                    media_id = %payload.media_id,
                    deleted = result.deleted,
                    failed = result.failed,
                    "Media objects deleted"
                ),
                Err(fault) => tracing::warn!(
                    media_id = %payload.media_id,
                    fault = %fault,
                    "Delete job failed"
                ),
            }
        });
        Ok(())
    }

    /// Runs the deletion hook, then removes the record.
    pub async fn delete_media(&self, media_id: &str) -> Result<(), AppError> {
        self.on_before_delete(media_id).await?;
        if !self.stores.media.delete(media_id).await? {
            return Err(AppError::not_found(MEDIA));
        }
        tracing::info!(media_id = %media_id, "Media deleted");
        Ok(())
    }

    /// Waits for every background task started so far.
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}
