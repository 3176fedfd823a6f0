//! Panomedia Services Layer
//!
//! Business coordination for the pipeline: the media orchestrator that accepts
//! uploads and applies job outcomes, upload validation, and the job handler set
//! the worker service dispatches to.

pub mod handlers;
pub mod orchestrator;
pub mod request;
pub mod validation;

pub use handlers::JobHandlers;
pub use orchestrator::{MediaOrchestrator, OrchestratorConfig};
pub use request::{
    ImageUpload, LocationInput, SubmitResponse, ThumbnailUpload, UploadRequest, VideoStatusView,
    MIME_JPEG, MIME_ZIP,
};
pub use validation::{validate_upload, ValidatedUpload};
