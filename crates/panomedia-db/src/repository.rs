use std::sync::Arc;

use async_trait::async_trait;
use panomedia_core::models::{
    Like, Location, MediaRecord, NewLocation, NewMediaRecord, ProcessingOutcome, VideoOutcome,
};
use panomedia_core::AppError;
use sqlx::PgPool;

use crate::memory::{MemoryLikeStore, MemoryLocationStore, MemoryMediaStore};
use crate::postgres::{PgLikeStore, PgLocationStore, PgMediaStore};

/// Media record store.
///
/// The conditional updates (`finish`, `begin_video`, `finish_video`) return
/// whether the write was applied, so a record leaves `pending` exactly once even
/// when two outcomes race.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn create(&self, new: NewMediaRecord) -> Result<MediaRecord, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<MediaRecord>, AppError>;

    /// Applies `outcome` only while the record is `pending`.
    async fn finish(&self, id: &str, outcome: ProcessingOutcome) -> Result<bool, AppError>;

    /// Marks a live photo's video conversion `pending` unless it is already pending
    /// or completed.
    async fn begin_video(&self, id: &str) -> Result<bool, AppError>;

    /// Applies a conversion outcome only while the conversion is `pending`.
    async fn finish_video(&self, id: &str, outcome: VideoOutcome) -> Result<bool, AppError>;

    async fn delete(&self, id: &str) -> Result<bool, AppError>;
}

/// Likes, unique per `(media_id, user_id)`.
#[async_trait]
pub trait LikeRepository: Send + Sync {
    async fn find(&self, media_id: &str, user_id: &str) -> Result<Option<Like>, AppError>;

    /// Inserts a like; returns `false` when the pair already exists.
    async fn create(&self, media_id: &str, user_id: &str) -> Result<bool, AppError>;

    /// Removes every like matching the pair; returns the number removed.
    async fn delete_all(&self, media_id: &str, user_id: &str) -> Result<u64, AppError>;

    async fn count(&self, media_id: &str) -> Result<i64, AppError>;
}

#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Returns the location registered under `(provider, provider_id)`, creating it
    /// from `new` on first use.
    async fn find_or_create_by_provider(&self, new: NewLocation) -> Result<Location, AppError>;

    async fn create(&self, new: NewLocation) -> Result<Location, AppError>;
}

/// The record stores used by the orchestrator.
#[derive(Clone)]
pub struct Stores {
    pub media: Arc<dyn MediaRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub locations: Arc<dyn LocationRepository>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            media: Arc::new(PgMediaStore::new(pool.clone())),
            likes: Arc::new(PgLikeStore::new(pool.clone())),
            locations: Arc::new(PgLocationStore::new(pool)),
        }
    }

    pub fn memory() -> Self {
        Self {
            media: Arc::new(MemoryMediaStore::new()),
            likes: Arc::new(MemoryLikeStore::new()),
            locations: Arc::new(MemoryLocationStore::new()),
        }
    }
}
