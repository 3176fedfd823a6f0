//! Job names, payloads and results exchanged with the job queue.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::media::MediaType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    ProcessPanoPhoto,
    ProcessLivePhoto,
    ConvertLivePhotoVideo,
    ShareMedia,
    DeleteObjects,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::ProcessPanoPhoto,
        JobKind::ProcessLivePhoto,
        JobKind::ConvertLivePhotoVideo,
        JobKind::ShareMedia,
        JobKind::DeleteObjects,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::ProcessPanoPhoto => "processPanoPhoto",
            JobKind::ProcessLivePhoto => "processLivePhoto",
            JobKind::ConvertLivePhotoVideo => "convertLivePhotoVideo",
            JobKind::ShareMedia => "shareMedia",
            JobKind::DeleteObjects => "deleteObjects",
        }
    }
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown job: {}", s))
    }
}

/// A typed job payload and the result type its job reports.
pub trait JobPayload: Serialize + Send + Sync {
    type Output: DeserializeOwned + Send;

    fn job_kind(&self) -> JobKind;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub width: u32,
    pub height: u32,
    /// Base64 encoded image bytes (a JPEG, or a zip archive when `has_zipped`).
    pub buffer: String,
    pub has_zipped: bool,
    /// Live photos: marker separating concatenated frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_arr_boundary: Option<String>,
}

impl ImagePayload {
    pub fn decode_buffer(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.buffer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThumbnailPayload {
    pub buffer: String,
}

impl ThumbnailPayload {
    pub fn decode_buffer(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.buffer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShareTarget {
    pub name: String,
    pub access_token: String,
}

/// Payload of `processPanoPhoto` and `processLivePhoto`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMediaPayload {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub media_id: String,
    pub sharding_key: String,
    pub image: ImagePayload,
    pub thumbnail: ThumbnailPayload,
    #[serde(default)]
    pub share: Vec<ShareTarget>,
}

pub fn encode_buffer(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

impl JobPayload for ProcessMediaPayload {
    type Output = ProcessingResult;

    fn job_kind(&self) -> JobKind {
        self.media_type.processing_job()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    Low,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Low => "low",
        }
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityTiles {
    pub quality: Quality,
    pub tiles: Vec<AssetDescriptor>,
}

/// Result reported by a processing job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProcessingResult {
    #[serde(rename_all = "camelCase")]
    PanoPhoto {
        thumbnail_url: String,
        image_url: String,
        mobile_url: String,
        quality: Vec<QualityTiles>,
    },
    #[serde(rename_all = "camelCase")]
    LivePhoto {
        thumbnail_url: String,
        count: u32,
        quality: Vec<QualityTiles>,
    },
}

impl ProcessingResult {
    pub fn media_type(&self) -> MediaType {
        match self {
            ProcessingResult::PanoPhoto { .. } => MediaType::PanoPhoto,
            ProcessingResult::LivePhoto { .. } => MediaType::LivePhoto,
        }
    }

    pub fn tiles(&self, quality: Quality) -> &[AssetDescriptor] {
        let groups = match self {
            ProcessingResult::PanoPhoto { quality, .. }
            | ProcessingResult::LivePhoto { quality, .. } => quality,
        };
        groups
            .iter()
            .find(|g| g.quality == quality)
            .map(|g| g.tiles.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoConversionPayload {
    pub media_id: String,
    pub sharding_key: String,
    pub frame_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoConversionResult {
    pub format: String,
    pub store_url: String,
}

impl JobPayload for VideoConversionPayload {
    type Output = VideoConversionResult;

    fn job_kind(&self) -> JobKind {
        JobKind::ConvertLivePhotoVideo
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SharePayload {
    pub media_id: String,
    pub provider: String,
    pub access_token: String,
    pub link: String,
    pub caption: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShareResult {
    pub provider: String,
    #[serde(default)]
    pub post_id: Option<String>,
}

impl JobPayload for SharePayload {
    type Output = ShareResult;

    fn job_kind(&self) -> JobKind {
        JobKind::ShareMedia
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteObjectsPayload {
    pub media_id: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteObjectsResult {
    pub deleted: usize,
    pub failed: usize,
}

impl JobPayload for DeleteObjectsPayload {
    type Output = DeleteObjectsResult;

    fn job_kind(&self) -> JobKind {
        JobKind::DeleteObjects
    }
}
