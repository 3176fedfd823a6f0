//! Application state shared by the job routes and whoever embeds the orchestrator.

use panomedia_services::MediaOrchestrator;
use panomedia_worker::{JobHandlerContext, LocalJobQueue};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Runs jobs posted to `/jobs/{name}`.
    pub queue: LocalJobQueue,
    pub orchestrator: Arc<MediaOrchestrator>,
    // The queue only holds a weak reference to its handlers.
    _handlers: Arc<dyn JobHandlerContext>,
}

impl AppState {
    pub fn new(
        queue: LocalJobQueue,
        orchestrator: Arc<MediaOrchestrator>,
        handlers: Arc<dyn JobHandlerContext>,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            _handlers: handlers,
        }
    }

    /// Stops taking jobs, then waits for the orchestrator's background submissions.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
        self.orchestrator.drain().await;
        tracing::info!("Worker service stopped");
    }
}
