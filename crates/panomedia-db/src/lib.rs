//! Record stores for media, likes and locations
//!
//! Each store is a trait with a Postgres implementation (`postgres`) and an
//! in-process implementation (`memory`) used when no database is configured and
//! in tests.

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod repository;

pub use memory::{MemoryLikeStore, MemoryLocationStore, MemoryMediaStore};
pub use pool::connect;
pub use postgres::{PgLikeStore, PgLocationStore, PgMediaStore};
pub use repository::{LikeRepository, LocationRepository, MediaRepository, Stores};
