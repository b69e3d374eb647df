use thiserror::Error;

use crate::geometry::BoundingBox;

#[derive(Debug, Error)]
pub enum SigCropError {
    #[error("image dimensions are missing or zero")]
    ZeroDimensions,

    #[error("intensity buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSizeMismatch {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },

    #[error("crop region {region:?} is invalid for a {width}x{height} image")]
    InvalidGeometry {
        region: BoundingBox,
        width: u32,
        height: u32,
    },

    #[error("detection was cancelled")]
    Cancelled,

    #[error("detection exceeded its deadline")]
    TimedOut,

    #[error("failed to decode image: {0}")]
    DecodeError(String),

    #[error("failed to encode image: {0}")]
    EncodeError(String),

    #[error("target size must be > 0 in both axes, got {width}x{height}")]
    InvalidTargetSize { width: u32, height: u32 },

    #[error("quality must be between 0.0 and 1.0, got {0}")]
    InvalidQuality(f32),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),
}
