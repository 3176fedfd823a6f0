//! Job handler context trait
//!
//! The worker service implements this trait for its application state. The queue
//! calls `dispatch_job` for every job it runs; the implementation matches on the
//! job kind and invokes the appropriate handler.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use panomedia_core::models::JobKind;
use serde_json::Value;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// A job accepted by a queue.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: Value,
}

impl Job {
    pub fn new(kind: JobKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
        }
    }
}

/// Context for job dispatch.
///
/// The queue holds a weak reference so that the context can own the queue.
#[async_trait]
pub trait JobHandlerContext: Send + Sync {
    /// Run the job and return its JSON result.
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<Value>;
}

/// Placeholder context used before the real one exists. Dispatch always errors.
struct NoopContext;

#[async_trait]
impl JobHandlerContext for NoopContext {
    async fn dispatch_job(self: Arc<Self>, _job: &Job) -> Result<Value> {
        Err(anyhow!("NoopContext: no handler context available"))
    }
}

/// Returns a dangling weak reference to a no-op context.
pub fn empty_context_weak() -> Weak<dyn JobHandlerContext> {
    let n: Arc<dyn JobHandlerContext> = Arc::new(NoopContext);
    Arc::downgrade(&n)
}
