//! In-process job queue: bounded channel, worker pool, per-job timeout.
//!
//! Shutdown: [`LocalJobQueue::shutdown`] stops the pool from taking new jobs.
//! Jobs still waiting in the channel resolve to [`JobFault::JobServer`]; jobs
//! already running finish or time out.

use async_trait::async_trait;
use panomedia_core::models::JobKind;
use panomedia_core::Config;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};

use crate::client::JobQueueClient;
use crate::context::{Job, JobHandlerContext};
use crate::fault::JobFault;

#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    pub max_workers: usize,
    pub queue_size: usize,
    pub job_timeout: Duration,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            queue_size: 256,
            job_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&Config> for JobQueueConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_workers: config.job_queue_max_workers,
            queue_size: config.job_queue_size,
            job_timeout: config.job_timeout(),
        }
    }
}

struct Envelope {
    job: Job,
    reply: oneshot::Sender<Result<Value, JobFault>>,
}

#[derive(Clone)]
pub struct LocalJobQueue {
    sender: mpsc::Sender<Envelope>,
    shutdown_tx: mpsc::Sender<()>,
}

impl LocalJobQueue {
    /// Create the queue and spawn its worker pool. Must be called inside a Tokio runtime.
    pub fn new(config: JobQueueConfig, context: Weak<dyn JobHandlerContext>) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_size.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(Self::worker_pool(config, context, receiver, shutdown_rx));

        Self {
            sender,
            shutdown_tx,
        }
    }

    async fn worker_pool(
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        mut receiver: mpsc::Receiver<Envelope>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            queue_size = config.queue_size,
            job_timeout_secs = config.job_timeout.as_secs(),
            "Job queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

        loop {
            let permit = tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let envelope = tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                envelope = receiver.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            tokio::spawn(Self::process(
                envelope,
                context.clone(),
                config.job_timeout,
                permit,
            ));
        }

        receiver.close();
        tracing::info!("Job queue worker pool stopped");
    }

    #[tracing::instrument(skip_all, fields(job.id = %envelope.job.id, job.kind = %envelope.job.kind))]
    async fn process(
        envelope: Envelope,
        context: Weak<dyn JobHandlerContext>,
        timeout: Duration,
        _permit: OwnedSemaphorePermit,
    ) {
        let Envelope { job, reply } = envelope;
        let start = Instant::now();

        let outcome = Self::run(job, context, timeout).await;

        match &outcome {
            Ok(_) => tracing::info!(
                duration_ms = start.elapsed().as_millis() as u64,
                "Job completed"
            ),
            Err(fault) => tracing::warn!(
                fault = %fault,
                duration_ms = start.elapsed().as_millis() as u64,
                "Job failed"
            ),
        }

        if reply.send(outcome).is_err() {
            tracing::debug!("Job submitter went away before the outcome was delivered");
        }
    }

    async fn run(
        job: Job,
        context: Weak<dyn JobHandlerContext>,
        timeout: Duration,
    ) -> Result<Value, JobFault> {
        let ctx = context
            .upgrade()
            .ok_or_else(|| JobFault::JobServer("job handler context was dropped".to_string()))?;

        // A separate task turns a panicking handler into a fault instead of a lost reply.
        let mut handle = tokio::spawn(async move { ctx.dispatch_job(&job).await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(e))) => Err(JobFault::Exception(format!("{:#}", e))),
            Ok(Err(join_error)) => Err(JobFault::JobServer(format!(
                "job handler crashed: {}",
                join_error
            ))),
            Err(_) => {
                handle.abort();
                Err(JobFault::Timeout(format!(
                    "no result after {} ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Signals the worker pool to stop taking jobs. Returns without waiting for
    /// running jobs.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[async_trait]
impl JobQueueClient for LocalJobQueue {
    async fn submit_job(&self, kind: JobKind, payload: Value) -> Result<Value, JobFault> {
        let job = Job::new(kind, payload);
        let job_id = job.id;
        let (reply, outcome) = oneshot::channel();

        self.sender
            .send(Envelope { job, reply })
            .await
            .map_err(|_| JobFault::Socket("job queue is closed".to_string()))?;

        tracing::debug!(job.id = %job_id, job.kind = %kind, "Job submitted to queue");

        outcome
            .await
            .map_err(|_| JobFault::JobServer("job was dropped before completion".to_string()))?
    }
}
