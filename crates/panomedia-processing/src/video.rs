//! Live-photo video conversion.
//!
//! Downloads the stored frames of a live photo into a scratch directory, encodes
//! them with ffmpeg and uploads the resulting video next to the frames.

use std::path::Path;
use std::process::Stdio;

use bytes::Bytes;
use futures::future::try_join_all;
use panomedia_core::models::{VideoConversionPayload, VideoConversionResult};
use panomedia_core::Config;
use panomedia_storage::{MediaObjectLayout, PutOptions, Uploader};
use tokio::process::Command;

use crate::error::{ProcessingError, Result};

pub const VIDEO_FORMAT: &str = "mp4";

#[derive(Clone)]
pub struct VideoConverter {
    uploader: Uploader,
    ffmpeg_path: String,
    frame_rate: u32,
    epoch_ms: u64,
}

impl VideoConverter {
    pub fn new(uploader: Uploader, ffmpeg_path: String, frame_rate: u32, epoch_ms: u64) -> Self {
        Self {
            uploader,
            ffmpeg_path,
            frame_rate: frame_rate.max(1),
            epoch_ms,
        }
    }

    pub fn from_config(uploader: Uploader, config: &Config) -> Self {
        Self::new(
            uploader,
            config.ffmpeg_path.clone(),
            config.video_frame_rate,
            config.snowflake_epoch_ms,
        )
    }

    #[tracing::instrument(
        skip(self, payload),
        fields(media_id = %payload.media_id, frames = payload.frame_count)
    )]
    pub async fn convert(&self, payload: &VideoConversionPayload) -> Result<VideoConversionResult> {
        if payload.frame_count == 0 {
            return Err(ProcessingError::InvalidPayload(
                "live photo has no frames to convert".to_string(),
            ));
        }

        let layout =
            MediaObjectLayout::from_id(&payload.media_id, &payload.sharding_key, self.epoch_ms)?;
        let workdir = tempfile::tempdir()?;

        let storage = self.uploader.storage();
        let downloads = (0..payload.frame_count).map(|i| {
            let key = layout.frame_key(i);
            let path = workdir.path().join(format!("frame_{:04}.jpg", i));
            async move {
                let data = storage.get(&key).await?;
                tokio::fs::write(&path, &data).await?;
                Ok::<_, ProcessingError>(())
            }
        });
        try_join_all(downloads).await?;

        let output = workdir.path().join(format!("video.{}", VIDEO_FORMAT));
        self.encode(workdir.path(), &output).await?;

        let video = tokio::fs::read(&output).await?;
        tracing::debug!(size = video.len(), "Video encoded");

        let key = layout.video_key(VIDEO_FORMAT);
        let store_url = self
            .uploader
            .upload(&key, Bytes::from(video), &PutOptions::public("video/mp4"))
            .await?;

        tracing::info!(store_url = %store_url, "Live photo video converted");
        Ok(VideoConversionResult {
            format: VIDEO_FORMAT.to_string(),
            store_url,
        })
    }

    async fn encode(&self, frames_dir: &Path, output: &Path) -> Result<()> {
        let pattern = frames_dir.join("frame_%04d.jpg");
        let args = [
            "-y".to_string(),
            "-framerate".to_string(),
            self.frame_rate.to_string(),
            "-i".to_string(),
            pattern.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            // libx264 needs even dimensions
            "-vf".to_string(),
            "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ];

        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                ProcessingError::Ffmpeg(format!("failed to run {}: {}", self.ffmpeg_path, e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ProcessingError::Ffmpeg(stderr.trim().to_string()));
        }
        Ok(())
    }
}
