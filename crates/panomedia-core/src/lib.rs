//! Panomedia Core Library
//!
//! This crate provides the domain models, error types, configuration, identifier
//! generation and sharding keys shared by every Panomedia component.

pub mod config;
pub mod error;
pub mod id;
pub mod models;
pub mod sharding;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use id::{GeneratedId, IdError, SnowflakeGenerator, SnowflakeId, SystemClock, TimeSource};
pub use sharding::ShardingKeyGenerator;
pub use storage_types::StorageBackend;
