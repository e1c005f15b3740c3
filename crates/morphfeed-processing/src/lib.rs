//! Morphfeed Processing Library
//!
//! Pure raster work used by the pipeline: probing uploaded images and
//! composing two generated outputs into a single side-by-side JPEG.
//!
//! Everything here is synchronous and CPU-bound. Async callers should run it
//! inside `tokio::task::spawn_blocking`.

pub mod composite;
pub mod inspect;

pub use composite::{
    compose, compose_bytes, CompositeImage, CompositionError, Orientation,
    COMPOSITE_CONTENT_TYPE, COMPOSITE_JPEG_QUALITY,
};
pub use inspect::{inspect, ImageInfo};
