//! Inputs of the orchestrator's public operations.
//!
//! Every upload field is optional here; [`crate::validation`] decides which ones
//! a media type requires.

use bytes::Bytes;
use panomedia_core::models::{ShareTarget, VideoStatus};
use serde::{Deserialize, Serialize};

pub const MIME_ZIP: &str = "application/zip";
pub const MIME_JPEG: &str = "image/jpeg";

#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub buffer: Option<Bytes>,
    pub mimetype: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Live photos only.
    pub orientation: Option<String>,
    /// Live photos only.
    pub action: Option<String>,
    /// Live photos only: marker separating concatenated frames.
    pub img_arr_boundary: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ThumbnailUpload {
    pub buffer: Option<Bytes>,
    pub mimetype: Option<String>,
    /// Panoramas only.
    pub lat: Option<f64>,
    /// Panoramas only.
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationInput {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub owner_id: String,
    pub image: ImageUpload,
    pub thumbnail: ThumbnailUpload,
    pub caption: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<LocationInput>,
    /// Social accounts to post to once processing completes.
    pub share: Vec<ShareTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub media_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatusView {
    pub video_status: VideoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
}
