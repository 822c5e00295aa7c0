//! Image export: raw sample buffers, 8-bit conversion, PNG encoding and a
//! projection sampler over a frozen voxel grid.
#![forbid(unsafe_code)]

mod buffer;
mod projection;

pub use buffer::{ExportTask, Image, RawBuffer, encode_png, save_png, to_image};
pub use projection::{NoiseParams, ProjectionAxis, ProjectionSampler};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("channel count {0} unsupported (expected 1..=4)")]
    InvalidChannels(u8),

    #[error("image dimensions {width}x{height} must both be > 0")]
    EmptyImage { width: u32, height: u32 },

    #[error("buffer holds {actual} samples, {expected} expected")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("grid axis of {0} voxels does not fit an image dimension")]
    DimensionOverflow(usize),

    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
