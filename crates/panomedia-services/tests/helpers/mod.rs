//! Test helpers: an orchestrator wired to an in-process queue whose jobs run on
//! the real handlers against a temporary local store.
//!
//! Run from workspace root: `cargo test -p panomedia-services`.

#![allow(dead_code)]

pub mod fixtures;
pub mod storage;

use async_trait::async_trait;
use panomedia_core::models::{JobKind, MediaRecord, MediaStatus};
use panomedia_core::{Config, ShardingKeyGenerator, SnowflakeGenerator, SystemClock};
use panomedia_db::Stores;
use panomedia_services::{JobHandlers, MediaOrchestrator, OrchestratorConfig};
use panomedia_storage::{LocalStorage, Storage};
use panomedia_worker::{
    JobFault, JobHandlerContext, JobQueueClient, JobQueueConfig, LocalJobQueue,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestPipeline {
    pub orchestrator: Arc<MediaOrchestrator>,
    pub storage: Arc<dyn Storage>,
    pub queue: LocalJobQueue,
    /// Every job the orchestrator submitted, in submission order.
    pub jobs: Arc<RecordingQueue>,
    _handlers: Arc<dyn JobHandlerContext>,
    _temp_dir: TempDir,
}

pub fn test_config() -> Config {
    Config {
        ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
        job_timeout_seconds: 120,
        mobile_width: 256,
        mobile_height: 128,
        ..Config::default()
    }
}

pub async fn setup_pipeline() -> TestPipeline {
    setup_pipeline_with(|storage| storage).await
}

/// Builds a pipeline whose storage is `wrap(local storage)`.
pub async fn setup_pipeline_with(
    wrap: impl FnOnce(Arc<dyn Storage>) -> Arc<dyn Storage>,
) -> TestPipeline {
    let config = test_config();
    let temp_dir = tempfile::tempdir().unwrap();
    let local: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(temp_dir.path(), "http://store.test/media".to_string())
            .await
            .unwrap(),
    );
    let storage = wrap(local);

    let handlers: Arc<dyn JobHandlerContext> =
        Arc::new(JobHandlers::from_config(&config, storage.clone()).unwrap());
    let queue = LocalJobQueue::new(JobQueueConfig::from(&config), Arc::downgrade(&handlers));

    let jobs = Arc::new(RecordingQueue::new(Arc::new(queue.clone())));
    let orchestrator = orchestrator_with(&config, jobs.clone(), storage.clone());

    TestPipeline {
        orchestrator,
        storage,
        queue,
        jobs,
        _handlers: handlers,
        _temp_dir: temp_dir,
    }
}

pub fn orchestrator_with(
    config: &Config,
    jobs: Arc<dyn JobQueueClient>,
    storage: Arc<dyn Storage>,
) -> Arc<MediaOrchestrator> {
    Arc::new(MediaOrchestrator::new(
        Stores::memory(),
        SnowflakeGenerator::with_clock(1, config.snowflake_epoch_ms, SystemClock).unwrap(),
        ShardingKeyGenerator::new(config.sharding_key_length),
        jobs,
        storage,
        OrchestratorConfig {
            cdn_base_url: Some("https://cdn.test".to_string()),
        },
    ))
}

/// Polls until the record leaves `pending`.
pub async fn wait_until_terminal(
    orchestrator: &MediaOrchestrator,
    media_id: &str,
) -> MediaRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(120);
    loop {
        let record = orchestrator.find_media(media_id).await.unwrap();
        if record.status != MediaStatus::Pending {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "media {} still pending",
            media_id
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// A queue that answers every job with the same fault.
pub struct FaultyQueue(pub JobFault);

#[async_trait]
impl JobQueueClient for FaultyQueue {
    async fn submit_job(&self, _kind: JobKind, _payload: Value) -> Result<Value, JobFault> {
        Err(self.0.clone())
    }
}

/// Records the kind of every submitted job and forwards it to `inner`.
pub struct RecordingQueue {
    inner: Arc<dyn JobQueueClient>,
    submitted: Mutex<Vec<JobKind>>,
}

impl RecordingQueue {
    pub fn new(inner: Arc<dyn JobQueueClient>) -> Self {
        Self {
            inner,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self, kind: JobKind) -> usize {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .filter(|k| **k == kind)
            .count()
    }
}

#[async_trait]
impl JobQueueClient for RecordingQueue {
    async fn submit_job(&self, kind: JobKind, payload: Value) -> Result<Value, JobFault> {
        self.submitted.lock().unwrap().push(kind);
        self.inner.submit_job(kind, payload).await
    }
}
