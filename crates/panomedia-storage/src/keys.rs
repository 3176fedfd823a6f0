//! Shared key generation for every object derived from a media record.
//!
//! Key format: `{mediaId}/{shardingKey}/{assetType}/{quality}/{datestamp}/{filename}`,
//! where the datestamp is the UTC creation date embedded in the media id.

use chrono::{DateTime, Utc};
use panomedia_core::models::Quality;
use panomedia_core::SnowflakeId;

use crate::traits::{StorageError, StorageResult};

/// Tiles per quality level of a panorama (a 4x2 grid).
pub const TILES_PER_QUALITY: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    Thumbnail,
    Image,
    Tile,
    Frame,
    Video,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Thumbnail => "thumbnail",
            AssetType::Image => "image",
            AssetType::Tile => "tiles",
            AssetType::Frame => "frames",
            AssetType::Video => "video",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaObjectLayout {
    media_id: String,
    sharding_key: String,
    datestamp: String,
}

impl MediaObjectLayout {
    pub fn new(media_id: &str, sharding_key: &str, created: DateTime<Utc>) -> Self {
        Self {
            media_id: media_id.to_string(),
            sharding_key: sharding_key.to_string(),
            datestamp: created.format("%Y%m%d").to_string(),
        }
    }

    /// Builds the layout from the creation time embedded in `media_id`.
    pub fn from_id(media_id: &str, sharding_key: &str, epoch_ms: u64) -> StorageResult<Self> {
        let id = SnowflakeId::decode(media_id)
            .map_err(|e| StorageError::InvalidKey(e.to_string()))?;
        let created = DateTime::from_timestamp_millis(id.unix_millis(epoch_ms) as i64)
            .ok_or_else(|| StorageError::InvalidKey(format!("timestamp out of range: {media_id}")))?;
        Ok(Self::new(media_id, sharding_key, created))
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn sharding_key(&self) -> &str {
        &self.sharding_key
    }

    /// `{mediaId}/{shardingKey}`, the common prefix of every derived key.
    pub fn prefix(&self) -> String {
        format!("{}/{}", self.media_id, self.sharding_key)
    }

    fn key(&self, asset: AssetType, quality: Quality, filename: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.prefix(),
            asset.as_str(),
            quality,
            self.datestamp,
            filename
        )
    }

    pub fn thumbnail_key(&self) -> String {
        self.key(
            AssetType::Thumbnail,
            Quality::High,
            &format!("{}_thumb.jpg", self.media_id),
        )
    }

    pub fn image_key(&self) -> String {
        self.key(
            AssetType::Image,
            Quality::High,
            &format!("{}.jpg", self.media_id),
        )
    }

    /// Downsized full panorama served to mobile clients.
    pub fn mobile_key(&self) -> String {
        self.key(
            AssetType::Image,
            Quality::Low,
            &format!("{}_mobile.jpg", self.media_id),
        )
    }

    pub fn tile_name(&self, index: u32) -> String {
        format!("{}_equirectangular_{}.jpg", self.media_id, index)
    }

    pub fn tile_key(&self, quality: Quality, index: u32) -> String {
        self.key(AssetType::Tile, quality, &self.tile_name(index))
    }

    pub fn frame_name(&self, index: u32) -> String {
        format!("{}_frame_{}.jpg", self.media_id, index)
    }

    pub fn frame_key(&self, index: u32) -> String {
        self.key(AssetType::Frame, Quality::High, &self.frame_name(index))
    }

    pub fn video_key(&self, format: &str) -> String {
        self.key(
            AssetType::Video,
            Quality::High,
            &format!("{}.{}", self.media_id, format),
        )
    }

    /// Every key a processed panorama owns.
    pub fn pano_keys(&self) -> Vec<String> {
        let mut keys = vec![self.thumbnail_key(), self.image_key(), self.mobile_key()];
        for quality in [Quality::High, Quality::Low] {
            keys.extend((0..TILES_PER_QUALITY).map(|i| self.tile_key(quality, i)));
        }
        keys
    }

    /// Every key a processed live photo with `frame_count` frames owns.
    pub fn live_keys(&self, frame_count: u32, video_format: &str) -> Vec<String> {
        let mut keys = vec![self.thumbnail_key()];
        keys.extend((0..frame_count).map(|i| self.frame_key(i)));
        keys.push(self.video_key(video_format));
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use panomedia_core::id::DEFAULT_EPOCH_MS;

    fn layout() -> MediaObjectLayout {
        let created = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        MediaObjectLayout::new("AbCd-_xyz0E=", "0a1b2c3d", created)
    }

    #[test]
    fn tile_key_follows_layout() {
        assert_eq!(
            layout().tile_key(Quality::Low, 5),
            "AbCd-_xyz0E=/0a1b2c3d/tiles/low/20240309/AbCd-_xyz0E=_equirectangular_5.jpg"
        );
    }

    #[test]
    fn all_keys_share_the_sharding_prefix() {
        let layout = layout();
        let keys = layout.pano_keys();
        assert_eq!(keys.len(), 3 + 2 * TILES_PER_QUALITY as usize);
        assert!(keys.iter().all(|k| k.starts_with("AbCd-_xyz0E=/0a1b2c3d/")));

        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());

        let live = layout.live_keys(3, "mp4");
        assert_eq!(live.len(), 5);
        assert!(live.last().unwrap().ends_with("/AbCd-_xyz0E=.mp4"));
    }

    #[test]
    fn datestamp_comes_from_the_id() {
        // 2015-01-02T00:00:00Z is one day past the epoch.
        let id = SnowflakeId::from_parts(86_400_000, 1, 0).encode();
        let layout = MediaObjectLayout::from_id(&id, "ff00ff00", DEFAULT_EPOCH_MS).unwrap();
        assert!(layout.image_key().contains("/image/high/20150102/"));

        assert!(MediaObjectLayout::from_id("bogus", "ff00ff00", DEFAULT_EPOCH_MS).is_err());
    }
}
