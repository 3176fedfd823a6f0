//! Error types module
//!
//! All request-facing failures are unified under [`AppError`]. Each variant describes
//! its own HTTP presentation through [`ErrorMetadata`], and [`AppError::error_body`]
//! renders the `{ "error": { "message": ... } }` body returned to clients.

use std::io;

use crate::id::IdError;

/// Level an error is logged at when it reaches the HTTP edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected failures, such as rejected uploads
    Debug,
    Warn,
    Error,
}

/// How an error presents itself to clients and logs.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Machine-readable code, e.g. `VALIDATION_ERROR`.
    fn error_code(&self) -> &'static str;

    /// Whether resubmitting the same request could succeed.
    fn is_recoverable(&self) -> bool;

    /// Message safe to return to a client.
    fn client_message(&self) -> String;

    /// Whether the internal message must stay out of responses.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error: {message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// The "missing properties" validation failure.
    pub fn missing_properties() -> Self {
        AppError::Validation("missing properties".to_string())
    }

    /// The "invalid <field> value" validation failure.
    pub fn invalid_value(field: &str) -> Self {
        AppError::Validation(format!("invalid {} value", field))
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<IdError> for AppError {
    fn from(err: IdError) -> Self {
        match err {
            IdError::InvalidEncoding(_) => AppError::not_found("media"),
            other => AppError::Internal(other.to_string()),
        }
    }
}

struct Presentation {
    status: u16,
    code: &'static str,
    recoverable: bool,
    sensitive: bool,
    level: LogLevel,
}

impl AppError {
    fn presentation(&self) -> Presentation {
        let (status, code, recoverable, sensitive, level) = match self {
            AppError::Validation(_) => (400, "VALIDATION_ERROR", false, false, LogLevel::Debug),
            AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
            AppError::ImageProcessing(_) => {
                (400, "IMAGE_PROCESSING_ERROR", false, false, LogLevel::Warn)
            }
            AppError::JobFailed(_) => (502, "JOB_FAILED", true, true, LogLevel::Warn),
            AppError::Database(_) => (500, "DATABASE_ERROR", true, true, LogLevel::Error),
            AppError::Storage(_) => (500, "STORAGE_ERROR", true, true, LogLevel::Error),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                (500, "INTERNAL_ERROR", true, true, LogLevel::Error)
            }
        };
        Presentation {
            status,
            code,
            recoverable,
            sensitive,
            level,
        }
    }

    /// Variant name, used as a log field.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Validation(_) => "Validation",
            AppError::NotFound(_) => "NotFound",
            AppError::Storage(_) => "Storage",
            AppError::ImageProcessing(_) => "ImageProcessing",
            AppError::JobFailed(_) => "JobFailed",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Client-facing JSON body: `{ "error": { "message": ... } }`.
    pub fn error_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "message": self.client_message(),
            }
        })
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        self.presentation().status
    }

    fn error_code(&self) -> &'static str {
        self.presentation().code
    }

    fn is_recoverable(&self) -> bool {
        self.presentation().recoverable
    }

    fn is_sensitive(&self) -> bool {
        self.presentation().sensitive
    }

    fn log_level(&self) -> LogLevel {
        self.presentation().level
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Validation(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::ImageProcessing(ref msg) => msg.clone(),
            AppError::JobFailed(_) => "Processing job failed".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_passed_through() {
        let err = AppError::missing_properties();
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.client_message(), "missing properties");

        let err = AppError::invalid_value("orientation");
        assert_eq!(err.to_string(), "invalid orientation value");
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("Resource not found".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "Resource not found");
        assert!(!err.is_sensitive());
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = AppError::Database("connection refused on 10.0.0.4".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to access database");

        let err = AppError::from(anyhow::anyhow!("secret path /var/lib"));
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_body_shape() {
        let body = AppError::invalid_value("mime").error_body();
        assert_eq!(body["error"]["message"], "invalid mime value");
    }

    #[test]
    fn test_job_failures_are_recoverable() {
        let err = AppError::JobFailed("job timed out: no result after 300000 ms".to_string());
        assert_eq!(err.http_status_code(), 502);
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Processing job failed");
        assert_eq!(err.error_type(), "JobFailed");
    }
}
