//! Data models for the media pipeline

mod job;
mod like;
mod location;
mod media;

pub use job::*;
pub use like::*;
pub use location::*;
pub use media::*;
