use panomedia_storage::StorageError;
use thiserror::Error;

/// Errors raised while a job handler runs. Any of them fails the whole job.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to decompress image archive: {0}")]
    Decompress(String),

    #[error("Image dimensions {width}x{height} are too small to tile")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("FFmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("Share failed: {0}")]
    Share(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Task(String),
}

impl From<zip::result::ZipError> for ProcessingError {
    fn from(err: zip::result::ZipError) -> Self {
        ProcessingError::Decompress(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ProcessingError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProcessingError::Task(err.to_string())
    }
}

impl From<ProcessingError> for panomedia_core::AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Storage(e) => e.into(),
            other => panomedia_core::AppError::ImageProcessing(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
