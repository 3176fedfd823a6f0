//! Job queue for Panomedia
//!
//! [`JobQueueClient`] is the submission seam used by the orchestrator: one call,
//! exactly one outcome (a JSON result or a [`JobFault`]). Two implementations:
//!
//! - [`LocalJobQueue`]: in-process worker pool dispatching to a [`JobHandlerContext`].
//! - [`HttpJobQueueClient`]: a remote job server reached over HTTP.

pub mod client;
pub mod context;
pub mod fault;
pub mod http;
pub mod queue;

pub use client::{JobQueueClient, JobQueueClientExt};
pub use context::{empty_context_weak, Job, JobHandlerContext};
pub use fault::{FaultKind, JobFault};
pub use http::{HttpJobQueueClient, JobErrorBody, JobErrorDetail, JobResultBody};
pub use queue::{JobQueueConfig, LocalJobQueue};
