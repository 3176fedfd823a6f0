//! Configuration module
//!
//! Settings for the worker service and the processing pipeline, loaded from the
//! environment (and an optional `.env` file).

use std::env;
use std::time::Duration;

use crate::id::{DEFAULT_EPOCH_MS, MAX_INSTANCE_ID};
use crate::sharding::DEFAULT_SHARDING_KEY_LENGTH;
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const DB_MAX_CONNECTIONS: u32 = 20;
const JOB_QUEUE_MAX_WORKERS: usize = 4;
const JOB_QUEUE_SIZE: usize = 256;
const JOB_TIMEOUT_SECS: u64 = 300;
const TILE_JPEG_QUALITY: u8 = 85;
const MOBILE_WIDTH: u32 = 4096;
const MOBILE_HEIGHT: u32 = 2048;
const VIDEO_FRAME_RATE: u32 = 12;
const DELETE_CONCURRENCY: usize = 8;

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub server_port: u16,
    /// Postgres connection string; the in-memory store is used when absent.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    // Storage
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub cdn_base_url: Option<String>,
    // Identifiers
    pub sharding_key_length: usize,
    pub snowflake_instance_id: u16,
    pub snowflake_epoch_ms: u64,
    // Job queue
    pub job_queue_max_workers: usize,
    pub job_queue_size: usize,
    pub job_timeout_seconds: u64,
    /// Remote job server; jobs run in-process when absent.
    pub job_server_url: Option<String>,
    // Processing
    pub tile_jpeg_quality: u8,
    pub mobile_width: u32,
    pub mobile_height: u32,
    pub ffmpeg_path: String,
    pub video_frame_rate: u32,
    pub delete_concurrency: usize,
    // Social share providers, as (name, endpoint)
    pub share_endpoints: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server_port: SERVER_PORT,
            database_url: None,
            db_max_connections: DB_MAX_CONNECTIONS,
            storage_backend: StorageBackend::Local,
            local_storage_path: Some("./data/media".to_string()),
            local_storage_base_url: Some(format!("http://localhost:{}/media", SERVER_PORT)),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            cdn_base_url: None,
            sharding_key_length: DEFAULT_SHARDING_KEY_LENGTH,
            snowflake_instance_id: 0,
            snowflake_epoch_ms: DEFAULT_EPOCH_MS,
            job_queue_max_workers: JOB_QUEUE_MAX_WORKERS,
            job_queue_size: JOB_QUEUE_SIZE,
            job_timeout_seconds: JOB_TIMEOUT_SECS,
            job_server_url: None,
            tile_jpeg_quality: TILE_JPEG_QUALITY,
            mobile_width: MOBILE_WIDTH,
            mobile_height: MOBILE_HEIGHT,
            ffmpeg_path: "ffmpeg".to_string(),
            video_frame_rate: VIDEO_FRAME_RATE,
            delete_concurrency: DELETE_CONCURRENCY,
            share_endpoints: Vec::new(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or(defaults.environment);

        let storage_backend = match non_empty("STORAGE_BACKEND") {
            Some(s) => s.parse()?,
            None => defaults.storage_backend,
        };

        // SHARE_ENDPOINTS=facebook=https://graph.example/feed,twitter=https://...
        let share_endpoints = non_empty("SHARE_ENDPOINTS")
            .map(|s| {
                s.split(',')
                    .filter_map(|pair| {
                        let (name, url) = pair.split_once('=')?;
                        Some((name.trim().to_lowercase(), url.trim().to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let config = Config {
            environment,
            server_port: parse_or("PORT", defaults.server_port),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            storage_backend,
            local_storage_path: non_empty("LOCAL_STORAGE_PATH").or(defaults.local_storage_path),
            local_storage_base_url: non_empty("LOCAL_STORAGE_BASE_URL")
                .or(defaults.local_storage_base_url),
            s3_bucket: non_empty("S3_BUCKET"),
            s3_region: non_empty("S3_REGION").or_else(|| non_empty("AWS_REGION")),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            cdn_base_url: non_empty("CDN_BASE_URL"),
            sharding_key_length: parse_or("SHARDING_KEY_LENGTH", defaults.sharding_key_length),
            snowflake_instance_id: parse_or(
                "SNOWFLAKE_INSTANCE_ID",
                defaults.snowflake_instance_id,
            ),
            snowflake_epoch_ms: parse_or("SNOWFLAKE_EPOCH_MS", defaults.snowflake_epoch_ms),
            job_queue_max_workers: parse_or(
                "JOB_QUEUE_MAX_WORKERS",
                defaults.job_queue_max_workers,
            ),
            job_queue_size: parse_or("JOB_QUEUE_SIZE", defaults.job_queue_size),
            job_timeout_seconds: parse_or("JOB_TIMEOUT_SECONDS", defaults.job_timeout_seconds),
            job_server_url: non_empty("JOB_SERVER_URL"),
            tile_jpeg_quality: parse_or("TILE_JPEG_QUALITY", defaults.tile_jpeg_quality),
            mobile_width: parse_or("MOBILE_WIDTH", defaults.mobile_width),
            mobile_height: parse_or("MOBILE_HEIGHT", defaults.mobile_height),
            ffmpeg_path: non_empty("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            video_frame_rate: parse_or("VIDEO_FRAME_RATE", defaults.video_frame_rate),
            delete_concurrency: parse_or("DELETE_CONCURRENCY", defaults.delete_concurrency),
            share_endpoints,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.snowflake_instance_id > MAX_INSTANCE_ID {
            return Err(anyhow::anyhow!(
                "SNOWFLAKE_INSTANCE_ID must be at most {}",
                MAX_INSTANCE_ID
            ));
        }

        if self.sharding_key_length == 0 {
            return Err(anyhow::anyhow!("SHARDING_KEY_LENGTH must be at least 1"));
        }

        if self.job_queue_max_workers == 0 || self.job_queue_size == 0 {
            return Err(anyhow::anyhow!(
                "JOB_QUEUE_MAX_WORKERS and JOB_QUEUE_SIZE must be positive"
            ));
        }

        if self.mobile_width < 4 || self.mobile_height < 2 {
            return Err(anyhow::anyhow!(
                "MOBILE_WIDTH and MOBILE_HEIGHT must be at least 4x2"
            ));
        }

        if !(1..=100).contains(&self.tile_jpeg_quality) {
            return Err(anyhow::anyhow!("TILE_JPEG_QUALITY must be between 1 and 100"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_postgres_url() {
        let config = Config {
            database_url: Some("mysql://localhost/db".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn s3_requires_bucket_and_region() {
        let mut config = Config {
            storage_backend: StorageBackend::S3,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        config.s3_bucket = Some("media".to_string());
        assert!(config.validate().is_err());
        config.s3_region = Some("eu-west-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_is_recognised_case_insensitively() {
        let mut config = Config::default();
        assert!(!config.is_production());
        config.environment = "Prod".to_string();
        assert!(config.is_production());
        config.environment = "PRODUCTION".to_string();
        assert!(config.is_production());
    }

    #[test]
    fn mobile_resolution_must_fit_a_tile_grid() {
        let config = Config {
            mobile_width: 3,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_instance_id_past_thirteen_bits() {
        let config = Config {
            snowflake_instance_id: MAX_INSTANCE_ID + 1,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
