//! Image tile worker.
//!
//! Handles `processPanoPhoto` and `processLivePhoto` jobs. A panorama is tiled on
//! two quality tracks that run concurrently: the high track crops the full
//! resolution source, the low track crops a copy resampled to the mobile
//! resolution, which is also uploaded as the mobile view. All eight tiles of a
//! track are cropped and uploaded concurrently. The first failure fails the
//! job; nothing partial is reported.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use image::{DynamicImage, GenericImageView};
use panomedia_core::models::{
    AssetDescriptor, MediaType, ProcessMediaPayload, ProcessingResult, Quality, QualityTiles,
};
use panomedia_core::Config;
use panomedia_storage::{MediaObjectLayout, PutOptions, Uploader};

use crate::archive;
use crate::error::{ProcessingError, Result};
use crate::stage::{JobStage, StageTracker};
use crate::tiling::{compute_tiles, TileGeometry};
use crate::transform;

#[derive(Debug, Clone)]
pub struct TileWorkerConfig {
    pub jpeg_quality: u8,
    pub mobile_width: u32,
    pub mobile_height: u32,
    /// Snowflake epoch, used to recover the datestamp embedded in media ids.
    pub epoch_ms: u64,
}

impl From<&Config> for TileWorkerConfig {
    fn from(config: &Config) -> Self {
        Self {
            jpeg_quality: config.tile_jpeg_quality,
            mobile_width: config.mobile_width,
            mobile_height: config.mobile_height,
            epoch_ms: config.snowflake_epoch_ms,
        }
    }
}

#[derive(Clone)]
pub struct ImageTileWorker {
    uploader: Uploader,
    config: TileWorkerConfig,
}

impl ImageTileWorker {
    pub fn new(uploader: Uploader, config: TileWorkerConfig) -> Self {
        Self { uploader, config }
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    #[tracing::instrument(
        skip(self, payload),
        fields(media_id = %payload.media_id, media_type = %payload.media_type, sharding_key = %payload.sharding_key)
    )]
    pub async fn process(&self, payload: &ProcessMediaPayload) -> Result<ProcessingResult> {
        let mut stage = StageTracker::new(&payload.media_id);

        let outcome = match payload.media_type {
            MediaType::PanoPhoto => self.process_pano(payload, &mut stage).await,
            MediaType::LivePhoto => self.process_live(payload, &mut stage).await,
        };

        match &outcome {
            Ok(_) => {
                stage.advance(JobStage::ReportedSuccess);
                tracing::info!("Media processed");
            }
            Err(e) => {
                tracing::error!(stage = %stage.current(), error = %e, "Media processing failed");
                stage.fail();
            }
        }
        outcome
    }

    async fn process_pano(
        &self,
        payload: &ProcessMediaPayload,
        stage: &mut StageTracker,
    ) -> Result<ProcessingResult> {
        let layout = self.layout(payload)?;

        stage.advance(JobStage::Decompressing);
        let (image_bytes, thumbnail_bytes) = decode_buffers(payload)?;
        let image_bytes = if payload.image.has_zipped {
            Bytes::from(archive::unzip_single(&image_bytes)?)
        } else {
            image_bytes
        };

        stage.advance(JobStage::Tiling);
        let source = transform::decode_blocking(image_bytes.clone()).await?;
        let (width, height) = source.dimensions();
        if (width, height) != (payload.image.width, payload.image.height) {
            tracing::warn!(
                declared_width = payload.image.width,
                declared_height = payload.image.height,
                width,
                height,
                "Declared dimensions differ from the decoded image"
            );
        }
        let tiles = compute_tiles(width, height)?;
        let source = Arc::new(source);

        stage.advance(JobStage::Uploading);
        let (thumbnail_url, image_url, high, (mobile_url, low)) = tokio::try_join!(
            self.upload(layout.thumbnail_key(), thumbnail_bytes),
            self.upload(layout.image_key(), image_bytes),
            self.tile_track(&layout, Quality::High, source.clone(), &tiles),
            self.low_track(&layout, source),
        )?;

        tracing::debug!(
            high_tiles = high.len(),
            low_tiles = low.len(),
            "Panorama tiles uploaded"
        );

        Ok(ProcessingResult::PanoPhoto {
            thumbnail_url,
            image_url,
            mobile_url,
            quality: vec![
                QualityTiles {
                    quality: Quality::High,
                    tiles: high,
                },
                QualityTiles {
                    quality: Quality::Low,
                    tiles: low,
                },
            ],
        })
    }

    async fn process_live(
        &self,
        payload: &ProcessMediaPayload,
        stage: &mut StageTracker,
    ) -> Result<ProcessingResult> {
        let layout = self.layout(payload)?;

        stage.advance(JobStage::Decompressing);
        let (image_bytes, thumbnail_bytes) = decode_buffers(payload)?;
        let frames = archive::extract_frames(
            &image_bytes,
            payload.image.has_zipped,
            payload.image.img_arr_boundary.as_deref(),
        )?;

        stage.advance(JobStage::Tiling);
        let count = frames.len() as u32;
        tracing::debug!(frames = count, "Live photo frames extracted");

        stage.advance(JobStage::Uploading);
        let frame_uploads = frames.into_iter().enumerate().map(|(i, frame)| {
            let index = i as u32;
            let layout = &layout;
            async move {
                let url = self.upload(layout.frame_key(index), Bytes::from(frame)).await?;
                Ok::<_, ProcessingError>(AssetDescriptor {
                    name: layout.frame_name(index),
                    url,
                })
            }
        });

        let (thumbnail_url, frames) = tokio::try_join!(
            self.upload(layout.thumbnail_key(), thumbnail_bytes),
            try_join_all(frame_uploads),
        )?;

        Ok(ProcessingResult::LivePhoto {
            thumbnail_url,
            count,
            quality: vec![QualityTiles {
                quality: Quality::High,
                tiles: frames,
            }],
        })
    }

    /// Resamples the source to the canonical mobile resolution, uploads it as
    /// the mobile view and tiles it.
    async fn low_track(
        &self,
        layout: &MediaObjectLayout,
        source: Arc<DynamicImage>,
    ) -> Result<(String, Vec<AssetDescriptor>)> {
        let (width, height) = (self.config.mobile_width, self.config.mobile_height);

        let mobile = transform::downsample_blocking(source, width, height).await?;
        let tiles = compute_tiles(width, height)?;
        let mobile = Arc::new(mobile);

        let encoded = {
            let mobile = mobile.clone();
            let quality = self.config.jpeg_quality;
            tokio::task::spawn_blocking(move || transform::encode_jpeg(&mobile, quality)).await??
        };

        tokio::try_join!(
            self.upload(layout.mobile_key(), encoded),
            self.tile_track(layout, Quality::Low, mobile, &tiles),
        )
    }

    async fn tile_track(
        &self,
        layout: &MediaObjectLayout,
        quality: Quality,
        source: Arc<DynamicImage>,
        tiles: &[TileGeometry],
    ) -> Result<Vec<AssetDescriptor>> {
        let uploads = tiles.iter().map(|tile| {
            let source = source.clone();
            async move {
                let bytes =
                    transform::crop_and_encode(source, *tile, self.config.jpeg_quality).await?;
                let url = self.upload(layout.tile_key(quality, tile.index), bytes).await?;
                Ok::<_, ProcessingError>(AssetDescriptor {
                    name: layout.tile_name(tile.index),
                    url,
                })
            }
        });

        // try_join_all keeps input order, so tiles stay sorted by index.
        try_join_all(uploads).await
    }

    async fn upload(&self, key: String, data: Bytes) -> Result<String> {
        Ok(self.uploader.upload(&key, data, &PutOptions::jpeg()).await?)
    }

    fn layout(&self, payload: &ProcessMediaPayload) -> Result<MediaObjectLayout> {
        Ok(MediaObjectLayout::from_id(
            &payload.media_id,
            &payload.sharding_key,
            self.config.epoch_ms,
        )?)
    }
}

fn decode_buffers(payload: &ProcessMediaPayload) -> Result<(Bytes, Bytes)> {
    let image = payload
        .image
        .decode_buffer()
        .map_err(|e| ProcessingError::InvalidPayload(format!("image buffer: {}", e)))?;
    let thumbnail = payload
        .thumbnail
        .decode_buffer()
        .map_err(|e| ProcessingError::InvalidPayload(format!("thumbnail buffer: {}", e)))?;
    Ok((Bytes::from(image), Bytes::from(thumbnail)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::zip_of;
    use crate::transform::tests::gradient_jpeg;
    use panomedia_core::id::DEFAULT_EPOCH_MS;
    use panomedia_core::models::{encode_buffer, ImagePayload, ThumbnailPayload};
    use panomedia_core::SnowflakeId;
    use panomedia_storage::{LocalStorage, Storage, TransferEvent};
    use tempfile::TempDir;

    fn media_id() -> String {
        // 2024-01-01T00:00:00Z relative to the default epoch
        let ms = 1_704_067_200_000 - DEFAULT_EPOCH_MS;
        SnowflakeId::from_parts(ms, 3, 0).encode()
    }

    fn config() -> TileWorkerConfig {
        TileWorkerConfig {
            jpeg_quality: 80,
            mobile_width: 64,
            mobile_height: 32,
            epoch_ms: DEFAULT_EPOCH_MS,
        }
    }

    async fn worker() -> (ImageTileWorker, Arc<dyn Storage>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(dir.path(), "http://cdn.test/media".to_string())
                .await
                .unwrap(),
        );
        let worker = ImageTileWorker::new(Uploader::new(storage.clone()), config());
        (worker, storage, dir)
    }

    fn pano_payload(image: Vec<u8>, zipped: bool, width: u32, height: u32) -> ProcessMediaPayload {
        ProcessMediaPayload {
            media_type: MediaType::PanoPhoto,
            media_id: media_id(),
            sharding_key: "a1b2c3d4".to_string(),
            image: ImagePayload {
                width,
                height,
                buffer: encode_buffer(&image),
                has_zipped: zipped,
                img_arr_boundary: None,
            },
            thumbnail: ThumbnailPayload {
                buffer: encode_buffer(&gradient_jpeg(8, 4)),
            },
            share: vec![],
        }
    }

    #[tokio::test]
    async fn panorama_produces_both_tracks() {
        let (worker, storage, _dir) = worker().await;
        let payload = pano_payload(gradient_jpeg(200, 100), false, 200, 100);

        let result = worker.process(&payload).await.unwrap();

        let high = result.tiles(Quality::High);
        let low = result.tiles(Quality::Low);
        assert_eq!(high.len(), 8);
        assert_eq!(low.len(), 8);
        assert_eq!(high[5].name, format!("{}_equirectangular_5.jpg", payload.media_id));

        let layout = MediaObjectLayout::from_id(&payload.media_id, "a1b2c3d4", DEFAULT_EPOCH_MS)
            .unwrap();
        for key in layout.pano_keys() {
            assert!(storage.exists(&key).await.unwrap(), "missing {}", key);
        }
        assert!(layout.tile_key(Quality::Low, 0).contains("/tiles/low/20240101/"));

        let tile = storage.get(&layout.tile_key(Quality::High, 7)).await.unwrap();
        let tile = transform::decode(&tile).unwrap();
        assert_eq!(tile.dimensions(), (50, 50));

        let mobile = storage.get(&layout.mobile_key()).await.unwrap();
        assert_eq!(transform::decode(&mobile).unwrap().dimensions(), (64, 32));
    }

    #[tokio::test]
    async fn mobile_track_uses_the_canonical_resolution() {
        let (worker, storage, _dir) = worker().await;
        let payload = pano_payload(gradient_jpeg(40, 20), false, 40, 20);

        worker.process(&payload).await.unwrap();

        let layout = MediaObjectLayout::from_id(&payload.media_id, "a1b2c3d4", DEFAULT_EPOCH_MS)
            .unwrap();
        let mobile = storage.get(&layout.mobile_key()).await.unwrap();
        assert_eq!(transform::decode(&mobile).unwrap().dimensions(), (64, 32));

        for index in [0, 7] {
            let low = storage.get(&layout.tile_key(Quality::Low, index)).await.unwrap();
            assert_eq!(transform::decode(&low).unwrap().dimensions(), (16, 16));
            let high = storage.get(&layout.tile_key(Quality::High, index)).await.unwrap();
            assert_eq!(transform::decode(&high).unwrap().dimensions(), (10, 10));
        }
    }

    #[tokio::test]
    async fn zipped_panorama_is_decompressed() {
        let (worker, _storage, _dir) = worker().await;
        let archive = zip_of(&[("pano.jpg", &gradient_jpeg(40, 20))]);

        let result = worker
            .process(&pano_payload(archive, true, 40, 20))
            .await
            .unwrap();
        assert_eq!(result.media_type(), MediaType::PanoPhoto);
    }

    #[tokio::test]
    async fn corrupt_archive_fails_the_job() {
        let (worker, _storage, _dir) = worker().await;

        let err = worker
            .process(&pano_payload(b"broken".to_vec(), true, 40, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Decompress(_)));
    }

    #[tokio::test]
    async fn uploads_are_observable() {
        let (worker, _storage, _dir) = worker().await;
        let mut events = worker.uploader().subscribe();

        worker
            .process(&pano_payload(gradient_jpeg(40, 20), false, 40, 20))
            .await
            .unwrap();

        let mut successes = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, TransferEvent::Success { .. }) {
                successes += 1;
            }
        }
        // thumbnail, full image, mobile image and 2 x 8 tiles
        assert_eq!(successes, 19);
    }

    #[tokio::test]
    async fn live_photo_frames_are_uploaded_in_order() {
        let (worker, storage, _dir) = worker().await;
        let frames = [gradient_jpeg(8, 8), gradient_jpeg(8, 8), gradient_jpeg(8, 8)];
        let mut buffer = Vec::new();
        for frame in &frames {
            buffer.extend_from_slice(frame);
            buffer.extend_from_slice(b"--frame--");
        }

        let mut payload = pano_payload(buffer, false, 8, 8);
        payload.media_type = MediaType::LivePhoto;
        payload.image.img_arr_boundary = Some("--frame--".to_string());

        let result = worker.process(&payload).await.unwrap();
        match &result {
            ProcessingResult::LivePhoto { count, .. } => assert_eq!(*count, 3),
            other => panic!("unexpected result: {:?}", other),
        }

        let layout = MediaObjectLayout::from_id(&payload.media_id, "a1b2c3d4", DEFAULT_EPOCH_MS)
            .unwrap();
        let names: Vec<_> = result
            .tiles(Quality::High)
            .iter()
            .map(|a| a.name.clone())
            .collect();
        assert_eq!(names, (0..3).map(|i| layout.frame_name(i)).collect::<Vec<_>>());
        assert_eq!(
            storage.get(&layout.frame_key(1)).await.unwrap().to_vec(),
            frames[1]
        );
    }
}
