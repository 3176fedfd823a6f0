use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::job::{JobKind, ProcessingResult};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MediaType {
    PanoPhoto,
    LivePhoto,
}

impl MediaType {
    /// The processing job for this media type.
    pub fn processing_job(&self) -> JobKind {
        match self {
            MediaType::PanoPhoto => JobKind::ProcessPanoPhoto,
            MediaType::LivePhoto => JobKind::ProcessLivePhoto,
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaType::PanoPhoto => write!(f, "panoPhoto"),
            MediaType::LivePhoto => write!(f, "livePhoto"),
        }
    }
}

impl FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "panoPhoto" => Ok(MediaType::PanoPhoto),
            "livePhoto" => Ok(MediaType::LivePhoto),
            _ => Err(AppError::invalid_value("type")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Pending,
    Completed,
    Failed,
}

impl MediaStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MediaStatus::Pending)
    }
}

impl Display for MediaStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaStatus::Pending => write!(f, "pending"),
            MediaStatus::Completed => write!(f, "completed"),
            MediaStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for MediaStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MediaStatus::Pending),
            "completed" => Ok(MediaStatus::Completed),
            "failed" => Ok(MediaStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid media status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl FromStr for Orientation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "landscape" => Ok(Orientation::Landscape),
            "portrait" => Ok(Orientation::Portrait),
            _ => Err(AppError::invalid_value("orientation")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LiveAction {
    Horizontal,
    Vertical,
}

impl FromStr for LiveAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "horizontal" => Ok(LiveAction::Horizontal),
            "vertical" => Ok(LiveAction::Vertical),
            _ => Err(AppError::invalid_value("action")),
        }
    }
}

/// Immutable geometry captured at upload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Dimension {
    Pano {
        width: u32,
        height: u32,
        lat: f64,
        lng: f64,
    },
    Live {
        width: u32,
        height: u32,
        orientation: Orientation,
        action: LiveAction,
    },
}

impl Dimension {
    pub fn width(&self) -> u32 {
        match self {
            Dimension::Pano { width, .. } | Dimension::Live { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Dimension::Pano { height, .. } | Dimension::Live { height, .. } => *height,
        }
    }
}

/// Storage locations and asset descriptors of a completed record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaContent {
    pub sharding_key: String,
    pub store_url: String,
    pub cdn_url: String,
    #[serde(flatten)]
    pub result: ProcessingResult,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum VideoStatus {
    #[default]
    #[serde(rename = "non-existent")]
    NonExistent,
    Pending,
    Completed,
    Failed,
}

impl Display for VideoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VideoStatus::NonExistent => write!(f, "non-existent"),
            VideoStatus::Pending => write!(f, "pending"),
            VideoStatus::Completed => write!(f, "completed"),
            VideoStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoState {
    pub status: VideoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
}

/// Outcome of a processing job, applied to a pending record exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    Completed(MediaContent),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    Completed { format: String, store_url: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// Encoded snowflake. Order records with `SnowflakeId::decode`, not this text.
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub status: MediaStatus,
    pub dimension: Dimension,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MediaContent>,
    pub sharding_key: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<i64>,
    pub caption: String,
    pub tags: Vec<String>,
    /// Live photos only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoState>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl MediaRecord {
    /// Moves a pending record to its terminal state. Returns `false` and leaves the
    /// record untouched when it already left `pending`.
    pub fn finish(&mut self, outcome: ProcessingOutcome, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match outcome {
            ProcessingOutcome::Completed(content) => {
                self.status = MediaStatus::Completed;
                self.content = Some(content);
            }
            ProcessingOutcome::Failed { .. } => {
                self.status = MediaStatus::Failed;
                self.content = None;
            }
        }
        self.modified = at;
        true
    }

    pub fn video_status(&self) -> VideoStatus {
        self.video
            .as_ref()
            .map(|v| v.status)
            .unwrap_or(VideoStatus::NonExistent)
    }

    /// Marks a video conversion as pending unless one is already pending or completed.
    pub fn begin_video(&mut self, at: DateTime<Utc>) -> bool {
        if matches!(
            self.video_status(),
            VideoStatus::Pending | VideoStatus::Completed
        ) {
            return false;
        }
        self.video = Some(VideoState {
            status: VideoStatus::Pending,
            format: None,
            store_url: None,
        });
        self.modified = at;
        true
    }

    /// Applies a conversion callback; only a pending conversion accepts one.
    pub fn finish_video(&mut self, outcome: VideoOutcome, at: DateTime<Utc>) -> bool {
        if self.video_status() != VideoStatus::Pending {
            return false;
        }
        self.video = Some(match outcome {
            VideoOutcome::Completed { format, store_url } => VideoState {
                status: VideoStatus::Completed,
                format: Some(format),
                store_url: Some(store_url),
            },
            VideoOutcome::Failed { .. } => VideoState {
                status: VideoStatus::Failed,
                format: None,
                store_url: None,
            },
        });
        self.modified = at;
        true
    }
}

/// Fields of a record at creation; the record starts `pending`.
#[derive(Debug, Clone)]
pub struct NewMediaRecord {
    pub id: String,
    pub media_type: MediaType,
    pub dimension: Dimension,
    pub sharding_key: String,
    pub owner_id: String,
    pub location_id: Option<i64>,
    pub caption: String,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
}

impl From<NewMediaRecord> for MediaRecord {
    fn from(new: NewMediaRecord) -> Self {
        let video = match new.media_type {
            MediaType::LivePhoto => Some(VideoState::default()),
            MediaType::PanoPhoto => None,
        };
        MediaRecord {
            id: new.id,
            media_type: new.media_type,
            status: MediaStatus::Pending,
            dimension: new.dimension,
            content: None,
            sharding_key: new.sharding_key,
            owner_id: new.owner_id,
            location_id: new.location_id,
            caption: new.caption,
            tags: new.tags,
            video,
            created: new.created,
            modified: new.created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{AssetDescriptor, Quality, QualityTiles};

    fn pending_live() -> MediaRecord {
        MediaRecord::from(NewMediaRecord {
            id: "AAAAAAAAAAE=".to_string(),
            media_type: MediaType::LivePhoto,
            dimension: Dimension::Live {
                width: 1080,
                height: 1920,
                orientation: Orientation::Portrait,
                action: LiveAction::Vertical,
            },
            sharding_key: "0a1b2c3d".to_string(),
            owner_id: "user-1".to_string(),
            location_id: None,
            caption: String::new(),
            tags: vec![],
            created: Utc::now(),
        })
    }

    fn content() -> MediaContent {
        MediaContent {
            sharding_key: "0a1b2c3d".to_string(),
            store_url: "http://store/x".to_string(),
            cdn_url: "http://cdn/x".to_string(),
            result: ProcessingResult::LivePhoto {
                thumbnail_url: "http://store/x/thumb.jpg".to_string(),
                count: 1,
                quality: vec![QualityTiles {
                    quality: Quality::High,
                    tiles: vec![AssetDescriptor {
                        name: "f0.jpg".to_string(),
                        url: "http://store/x/f0.jpg".to_string(),
                    }],
                }],
            },
        }
    }

    #[test]
    fn finish_applies_exactly_once() {
        let mut record = pending_live();
        assert_eq!(record.status, MediaStatus::Pending);
        assert!(record.content.is_none());

        assert!(record.finish(ProcessingOutcome::Completed(content()), Utc::now()));
        assert_eq!(record.status, MediaStatus::Completed);
        assert!(record.content.is_some());

        let failed = ProcessingOutcome::Failed {
            reason: "late".to_string(),
        };
        assert!(!record.finish(failed, Utc::now()));
        assert_eq!(record.status, MediaStatus::Completed);
        assert!(record.content.is_some());
    }

    #[test]
    fn failed_record_has_no_content() {
        let mut record = pending_live();
        let failed = ProcessingOutcome::Failed {
            reason: "timeout".to_string(),
        };
        assert!(record.finish(failed, Utc::now()));
        assert_eq!(record.status, MediaStatus::Failed);
        assert!(record.content.is_none());
        assert!(!record.finish(ProcessingOutcome::Completed(content()), Utc::now()));
        assert!(record.content.is_none());
    }

    #[test]
    fn video_state_transitions() {
        let mut record = pending_live();
        assert_eq!(record.video_status(), VideoStatus::NonExistent);
        assert!(record.begin_video(Utc::now()));
        assert!(!record.begin_video(Utc::now()));

        assert!(record.finish_video(
            VideoOutcome::Failed {
                reason: "ffmpeg".to_string()
            },
            Utc::now()
        ));
        assert_eq!(record.video_status(), VideoStatus::Failed);

        assert!(record.begin_video(Utc::now()));
        assert!(record.finish_video(
            VideoOutcome::Completed {
                format: "mp4".to_string(),
                store_url: "http://store/v.mp4".to_string()
            },
            Utc::now()
        ));
        assert!(!record.begin_video(Utc::now()));
        let video = record.video.as_ref().unwrap();
        assert_eq!(video.format.as_deref(), Some("mp4"));
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut record = pending_live();
        record.finish(ProcessingOutcome::Completed(content()), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "livePhoto");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["dimension"]["orientation"], "portrait");
        assert_eq!(json["content"]["type"], "livePhoto");
        assert_eq!(json["content"]["shardingKey"], "0a1b2c3d");
        assert_eq!(json["video"]["status"], "non-existent");
        assert_eq!(VideoStatus::NonExistent.to_string(), "non-existent");
        assert_eq!(
            serde_json::from_value::<VideoStatus>(serde_json::json!("non-existent")).unwrap(),
            VideoStatus::NonExistent
        );

        let back: MediaRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn invalid_enum_values_name_the_field() {
        let err = "diagonal".parse::<Orientation>().unwrap_err();
        assert_eq!(err.to_string(), "invalid orientation value");
        let err = "sideways".parse::<LiveAction>().unwrap_err();
        assert_eq!(err.to_string(), "invalid action value");
    }
}
