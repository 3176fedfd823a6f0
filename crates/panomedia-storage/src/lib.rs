//! Panomedia Storage Library
//!
//! Object storage abstraction for processed media, with S3 and local filesystem
//! backends.
//!
//! # Storage key format
//!
//! Every object derived from a media record lives under
//! `{mediaId}/{shardingKey}/{assetType}/{quality}/{datestamp}/{filename}`. Key
//! generation is centralized in the `keys` module so that the worker that writes
//! objects and the cleanup job that removes them agree on every path.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod transfer;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{AssetType, MediaObjectLayout, TILES_PER_QUALITY};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use panomedia_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{DeleteSummary, ObjectAcl, PutOptions, Storage, StorageError, StorageResult};
pub use transfer::{Remover, TransferEvent, Uploader};
