use async_trait::async_trait;
use chrono::{DateTime, Utc};
use panomedia_core::models::{
    Dimension, Like, Location, MediaContent, MediaRecord, NewLocation, NewMediaRecord,
    ProcessingOutcome, VideoOutcome, VideoState, VideoStatus,
};
use panomedia_core::AppError;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};

use crate::repository::{LikeRepository, LocationRepository, MediaRepository};

const MEDIA_COLUMNS: &str = "id, media_type, status, dimension, content, sharding_key, owner_id, \
     location_id, caption, tags, video, created, modified";

#[derive(FromRow)]
struct MediaRow {
    id: String,
    media_type: String,
    status: String,
    dimension: Json<Dimension>,
    content: Option<Json<MediaContent>>,
    sharding_key: String,
    owner_id: String,
    location_id: Option<i64>,
    caption: String,
    tags: Vec<String>,
    video: Option<Json<VideoState>>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl TryFrom<MediaRow> for MediaRecord {
    type Error = AppError;

    fn try_from(row: MediaRow) -> Result<Self, Self::Error> {
        Ok(MediaRecord {
            id: row.id,
            media_type: row.media_type.parse()?,
            status: row
                .status
                .parse()
                .map_err(|e: anyhow::Error| AppError::Database(e.to_string()))?,
            dimension: row.dimension.0,
            content: row.content.map(|c| c.0),
            sharding_key: row.sharding_key,
            owner_id: row.owner_id,
            location_id: row.location_id,
            caption: row.caption,
            tags: row.tags,
            video: row.video.map(|v| v.0),
            created: row.created,
            modified: row.modified,
        })
    }
}

/// Media records in Postgres
#[derive(Clone)]
pub struct PgMediaStore {
    pool: PgPool,
}

impl PgMediaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRepository for PgMediaStore {
    #[tracing::instrument(skip(self, new), fields(db.table = "media", db.operation = "insert", media_id = %new.id))]
    async fn create(&self, new: NewMediaRecord) -> Result<MediaRecord, AppError> {
        let record = MediaRecord::from(new);

        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            r#"
            INSERT INTO media (id, media_type, status, dimension, content, sharding_key, owner_id,
                               location_id, caption, tags, video, created, modified)
            VALUES ($1, $2, $3, $4, NULL, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {MEDIA_COLUMNS}
            "#
        ))
        .bind(&record.id)
        .bind(record.media_type.to_string())
        .bind(record.status.to_string())
        .bind(Json(&record.dimension))
        .bind(&record.sharding_key)
        .bind(&record.owner_id)
        .bind(record.location_id)
        .bind(&record.caption)
        .bind(&record.tags)
        .bind(record.video.as_ref().map(Json))
        .bind(record.created)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    async fn find_by_id(&self, id: &str) -> Result<Option<MediaRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MediaRecord::try_from).transpose()
    }

    #[tracing::instrument(skip(self, outcome), fields(db.table = "media", db.operation = "update"))]
    async fn finish(&self, id: &str, outcome: ProcessingOutcome) -> Result<bool, AppError> {
        let result = match outcome {
            ProcessingOutcome::Completed(content) => {
                sqlx::query(
                    r#"
                    UPDATE media SET status = 'completed', content = $2, modified = NOW()
                    WHERE id = $1 AND status = 'pending'
                    "#,
                )
                .bind(id)
                .bind(Json(&content))
                .execute(&self.pool)
                .await?
            }
            ProcessingOutcome::Failed { .. } => {
                sqlx::query(
                    r#"
                    UPDATE media SET status = 'failed', content = NULL, modified = NOW()
                    WHERE id = $1 AND status = 'pending'
                    "#,
                )
                .bind(id)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "update"))]
    async fn begin_video(&self, id: &str) -> Result<bool, AppError> {
        let pending = VideoState {
            status: VideoStatus::Pending,
            format: None,
            store_url: None,
        };
        let result = sqlx::query(
            r#"
            UPDATE media SET video = $2, modified = NOW()
            WHERE id = $1
              AND media_type = 'livePhoto'
              AND COALESCE(video->>'status', 'non-existent') NOT IN ('pending', 'completed')
            "#,
        )
        .bind(id)
        .bind(Json(&pending))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self, outcome), fields(db.table = "media", db.operation = "update"))]
    async fn finish_video(&self, id: &str, outcome: VideoOutcome) -> Result<bool, AppError> {
        let state = match outcome {
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
        };
        let result = sqlx::query(
            r#"
            UPDATE media SET video = $2, modified = NOW()
            WHERE id = $1 AND video->>'status' = 'pending'
            "#,
        )
        .bind(id)
        .bind(Json(&state))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "delete"))]
    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(FromRow)]
struct LikeRow {
    media_id: String,
    user_id: String,
    created: DateTime<Utc>,
}

impl From<LikeRow> for Like {
    fn from(row: LikeRow) -> Self {
        Like {
            media_id: row.media_id,
            user_id: row.user_id,
            created: row.created,
        }
    }
}

#[derive(Clone)]
pub struct PgLikeStore {
    pool: PgPool,
}

impl PgLikeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LikeRepository for PgLikeStore {
    async fn find(&self, media_id: &str, user_id: &str) -> Result<Option<Like>, AppError> {
        let row = sqlx::query_as::<Postgres, LikeRow>(
            "SELECT media_id, user_id, created FROM likes WHERE media_id = $1 AND user_id = $2",
        )
        .bind(media_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Like::from))
    }

    async fn create(&self, media_id: &str, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO likes (media_id, user_id, created) VALUES ($1, $2, NOW())
            ON CONFLICT (media_id, user_id) DO NOTHING
            "#,
        )
        .bind(media_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_all(&self, media_id: &str, user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM likes WHERE media_id = $1 AND user_id = $2")
            .bind(media_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count(&self, media_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM likes WHERE media_id = $1",
        )
        .bind(media_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[derive(FromRow)]
struct LocationRow {
    id: i64,
    name: String,
    provider: Option<String>,
    provider_id: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            name: row.name,
            provider: row.provider,
            provider_id: row.provider_id,
            lat: row.lat,
            lng: row.lng,
        }
    }
}

#[derive(Clone)]
pub struct PgLocationStore {
    pool: PgPool,
}

impl PgLocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationRepository for PgLocationStore {
    async fn find_or_create_by_provider(&self, new: NewLocation) -> Result<Location, AppError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<Postgres, LocationRow>(
            r#"
            INSERT INTO locations (name, provider, provider_id, lat, lng)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider, provider_id) DO UPDATE SET provider = EXCLUDED.provider
            RETURNING id, name, provider, provider_id, lat, lng
            "#,
        )
        .bind(&new.name)
        .bind(&new.provider)
        .bind(&new.provider_id)
        .bind(new.lat)
        .bind(new.lng)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn create(&self, new: NewLocation) -> Result<Location, AppError> {
        let row = sqlx::query_as::<Postgres, LocationRow>(
            r#"
            INSERT INTO locations (name, provider, provider_id, lat, lng)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, provider, provider_id, lat, lng
            "#,
        )
        .bind(&new.name)
        .bind(&new.provider)
        .bind(&new.provider_id)
        .bind(new.lat)
        .bind(new.lng)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}
