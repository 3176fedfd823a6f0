//! In-process stores enforcing the same keys and conditional updates as Postgres.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use panomedia_core::models::{
    Like, Location, MediaRecord, NewLocation, NewMediaRecord, ProcessingOutcome, VideoOutcome,
};
use panomedia_core::AppError;
use tokio::sync::RwLock;

use crate::repository::{LikeRepository, LocationRepository, MediaRepository};

#[derive(Default)]
pub struct MemoryMediaStore {
    records: RwLock<HashMap<String, MediaRecord>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MediaRepository for MemoryMediaStore {
    async fn create(&self, new: NewMediaRecord) -> Result<MediaRecord, AppError> {
        let mut records = self.records.write().await;
        if records.contains_key(&new.id) {
            return Err(AppError::Database(format!("duplicate media id {}", new.id)));
        }
        let record = MediaRecord::from(new);
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<MediaRecord>, AppError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn finish(&self, id: &str, outcome: ProcessingOutcome) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        Ok(records
            .get_mut(id)
            .map(|record| record.finish(outcome, Utc::now()))
            .unwrap_or(false))
    }

    async fn begin_video(&self, id: &str) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        Ok(records
            .get_mut(id)
            .filter(|record| record.video.is_some())
            .map(|record| record.begin_video(Utc::now()))
            .unwrap_or(false))
    }

    async fn finish_video(&self, id: &str, outcome: VideoOutcome) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        Ok(records
            .get_mut(id)
            .map(|record| record.finish_video(outcome, Utc::now()))
            .unwrap_or(false))
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryLikeStore {
    likes: RwLock<BTreeMap<(String, String), Like>>,
}

impl MemoryLikeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LikeRepository for MemoryLikeStore {
    async fn find(&self, media_id: &str, user_id: &str) -> Result<Option<Like>, AppError> {
        let key = (media_id.to_string(), user_id.to_string());
        Ok(self.likes.read().await.get(&key).cloned())
    }

    async fn create(&self, media_id: &str, user_id: &str) -> Result<bool, AppError> {
        let key = (media_id.to_string(), user_id.to_string());
        let mut likes = self.likes.write().await;
        if likes.contains_key(&key) {
            return Ok(false);
        }
        likes.insert(
            key,
            Like {
                media_id: media_id.to_string(),
                user_id: user_id.to_string(),
                created: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn delete_all(&self, media_id: &str, user_id: &str) -> Result<u64, AppError> {
        let key = (media_id.to_string(), user_id.to_string());
        Ok(self.likes.write().await.remove(&key).map_or(0, |_| 1))
    }

    async fn count(&self, media_id: &str) -> Result<i64, AppError> {
        let likes = self.likes.read().await;
        Ok(likes.keys().filter(|(m, _)| m == media_id).count() as i64)
    }
}

#[derive(Default)]
pub struct MemoryLocationStore {
    next_id: AtomicI64,
    locations: RwLock<Vec<Location>>,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, locations: &mut Vec<Location>, new: NewLocation) -> Location {
        let location = Location {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: new.name,
            provider: new.provider,
            provider_id: new.provider_id,
            lat: new.lat,
            lng: new.lng,
        };
        locations.push(location.clone());
        location
    }
}

#[async_trait]
impl LocationRepository for MemoryLocationStore {
    async fn find_or_create_by_provider(&self, new: NewLocation) -> Result<Location, AppError> {
        let mut locations = self.locations.write().await;
        let existing = locations
            .iter()
            .find(|l| {
                new.provider.is_some()
                    && l.provider == new.provider
                    && l.provider_id == new.provider_id
            })
            .cloned();
        match existing {
            Some(location) => Ok(location),
            None => Ok(self.insert(&mut locations, new)),
        }
    }

    async fn create(&self, new: NewLocation) -> Result<Location, AppError> {
        let mut locations = self.locations.write().await;
        Ok(self.insert(&mut locations, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panomedia_core::models::{Dimension, MediaStatus, MediaType};

    fn new_pano(id: &str) -> NewMediaRecord {
        NewMediaRecord {
            id: id.to_string(),
            media_type: MediaType::PanoPhoto,
            dimension: Dimension::Pano {
                width: 8192,
                height: 4096,
                lat: 48.85,
                lng: 2.35,
            },
            sharding_key: "cafebabe".to_string(),
            owner_id: "owner".to_string(),
            location_id: None,
            caption: "".to_string(),
            tags: vec![],
            created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn finish_is_conditional_on_pending() {
        let store = MemoryMediaStore::new();
        store.create(new_pano("a")).await.unwrap();

        let failed = ProcessingOutcome::Failed {
            reason: "timeout".to_string(),
        };
        assert!(store.finish("a", failed.clone()).await.unwrap());
        assert!(!store.finish("a", failed).await.unwrap());

        let record = store.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(record.status, MediaStatus::Failed);
        assert!(!store.finish("missing", ProcessingOutcome::Failed { reason: String::new() })
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryMediaStore::new();
        store.create(new_pano("a")).await.unwrap();
        assert!(store.create(new_pano("a")).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn panoramas_have_no_video_conversion() {
        let store = MemoryMediaStore::new();
        store.create(new_pano("a")).await.unwrap();
        assert!(!store.begin_video("a").await.unwrap());
    }

    #[tokio::test]
    async fn likes_are_unique_per_pair() {
        let store = MemoryLikeStore::new();
        assert!(store.create("m", "u1").await.unwrap());
        assert!(!store.create("m", "u1").await.unwrap());
        assert!(store.create("m", "u2").await.unwrap());
        assert_eq!(store.count("m").await.unwrap(), 2);

        assert_eq!(store.delete_all("m", "u1").await.unwrap(), 1);
        assert_eq!(store.delete_all("m", "u1").await.unwrap(), 0);
        assert_eq!(store.count("m").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn provider_locations_are_reused() {
        let store = MemoryLocationStore::new();
        let new = NewLocation {
            name: "Eiffel Tower".to_string(),
            provider: Some("foursquare".to_string()),
            provider_id: Some("4adcda".to_string()),
            ..NewLocation::default()
        };
        let first = store.find_or_create_by_provider(new.clone()).await.unwrap();
        let second = store.find_or_create_by_provider(new).await.unwrap();
        assert_eq!(first.id, second.id);

        let bare = store
            .create(NewLocation {
                name: "Home".to_string(),
                ..NewLocation::default()
            })
            .await
            .unwrap();
        assert_ne!(bare.id, first.id);
    }
}
