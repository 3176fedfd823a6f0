use async_trait::async_trait;
use panomedia_core::models::{JobKind, JobPayload};
use serde_json::Value;

use crate::fault::JobFault;

/// Submits named jobs. Each call resolves to exactly one outcome.
///
/// There is no ordering between submissions and no affinity to a worker.
#[async_trait]
pub trait JobQueueClient: Send + Sync {
    async fn submit_job(&self, kind: JobKind, payload: Value) -> Result<Value, JobFault>;
}

/// Typed submission on top of [`JobQueueClient`].
#[async_trait]
pub trait JobQueueClientExt: JobQueueClient {
    async fn submit<P: JobPayload>(&self, payload: &P) -> Result<P::Output, JobFault> {
        let value = serde_json::to_value(payload)
            .map_err(|e| JobFault::Exception(format!("invalid payload: {}", e)))?;
        let result = self.submit_job(payload.job_kind(), value).await?;
        serde_json::from_value(result)
            .map_err(|e| JobFault::Exception(format!("invalid job result: {}", e)))
    }
}

impl<T: JobQueueClient + ?Sized> JobQueueClientExt for T {}
