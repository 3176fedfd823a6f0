//! Application setup and initialization

pub mod routes;
pub mod server;

use anyhow::{Context, Result};
use axum::Router;
use panomedia_core::{Config, ShardingKeyGenerator, SnowflakeGenerator, SystemClock};
use panomedia_db::Stores;
use panomedia_services::{JobHandlers, MediaOrchestrator, OrchestratorConfig};
use panomedia_storage::create_storage;
use panomedia_worker::{
    HttpJobQueueClient, JobHandlerContext, JobQueueClient, JobQueueConfig, LocalJobQueue,
};
use std::sync::Arc;

use crate::state::AppState;

/// Build storage, stores, job handlers, the local queue and the orchestrator.
///
/// The orchestrator submits to `JOB_SERVER_URL` when set and to the local queue
/// otherwise.
pub async fn initialize_app(config: Config) -> Result<(AppState, Router)> {
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(backend = ?config.storage_backend, "Storage initialized");

    let stores = Stores::from_config(&config).await?;

    let handlers: Arc<dyn JobHandlerContext> =
        Arc::new(JobHandlers::from_config(&config, storage.clone())?);
    let queue = LocalJobQueue::new(JobQueueConfig::from(&config), Arc::downgrade(&handlers));

    let jobs: Arc<dyn JobQueueClient> = match &config.job_server_url {
        Some(url) => {
            tracing::info!(job_server = %url, "Submitting jobs to remote job server");
            Arc::new(HttpJobQueueClient::new(url.clone(), config.job_timeout())?)
        }
        None => Arc::new(queue.clone()),
    };

    let ids = SnowflakeGenerator::with_clock(
        config.snowflake_instance_id,
        config.snowflake_epoch_ms,
        SystemClock,
    )
    .context("Invalid snowflake configuration")?;

    let orchestrator = Arc::new(MediaOrchestrator::new(
        stores,
        ids,
        ShardingKeyGenerator::new(config.sharding_key_length),
        jobs,
        storage,
        OrchestratorConfig::from(&config),
    ));

    let state = AppState::new(queue, orchestrator, handlers);
    let router = routes::router(state.clone());

    Ok((state, router))
}
