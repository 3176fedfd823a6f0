//! Panomedia Processing Library
//!
//! Job handlers that run on the worker side of the queue:
//! - Panorama tiling and live-photo frame extraction (`tile_worker`)
//! - Live-photo video conversion through ffmpeg (`video`)
//! - Social sharing (`share`)
//! - Bulk removal of derived objects (`cleanup`)

pub mod archive;
pub mod cleanup;
pub mod error;
pub mod share;
pub mod stage;
pub mod tile_worker;
pub mod tiling;
pub mod transform;
pub mod video;

pub use cleanup::ObjectCleaner;
pub use error::{ProcessingError, Result};
pub use share::ShareClient;
pub use stage::{JobStage, StageTracker};
pub use tile_worker::{ImageTileWorker, TileWorkerConfig};
pub use tiling::{compute_tiles, TileGeometry, TILE_COLUMNS, TILE_ROWS};
pub use video::{VideoConverter, VIDEO_FORMAT};
