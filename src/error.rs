use std::path::PathBuf;

use thiserror::Error;

/// Error type for the per-file processing pipeline
///
/// Every variant renders a message that can be shown to the end user as-is.
/// Only [`Error::MaskRead`] stops a whole batch; the rest fail a single file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The input image could not be opened or decoded
    #[error("Could not read {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// The external mask could not be read
    ///
    /// Every file of the batch depends on the mask, so this aborts the batch.
    #[error("Could not read mask image {}: {message}", path.display())]
    MaskRead { path: PathBuf, message: String },

    /// Channel count or alpha availability is not one of the supported layouts
    ///
    /// One- and three-channel images need an external mask when filling is enabled.
    #[error(
        "Unsupported channel layout: {channels} channel(s). Only grayscale, RGB and RGBA images are supported; grayscale and RGB images need an external alpha mask"
    )]
    UnsupportedLayout { channels: usize },

    /// Multiplying color by alpha or appending the alpha channel failed
    #[error("Alpha composite failed: {0}")]
    Composite(String),

    /// Push-pull hole filling failed
    #[error("Hole filling failed: {0}")]
    Reconstruction(String),

    /// Vector normalization failed
    #[error("Could not normalize image: {0}")]
    Normalize(String),

    /// Vector axis repair failed
    #[error("Could not repair normals: {0}")]
    Repair(String),

    /// The output file could not be created or written
    #[error("Could not write {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    /// A pipeline state that classification should have ruled out
    #[error("Internal error: {0}")]
    Internal(String),

    /// The batch was cancelled before this file started
    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` when no other file of the batch can proceed after this error.
    pub const fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::MaskRead { .. })
    }
}

/// Error type for raster buffer operations
///
/// Pipeline stages wrap these into the [`Error`] variant of the stage that hit them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    /// Two buffers taking part in one operation have different sizes
    #[error("Image dimensions do not match: expected {expected:?}, actual {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height)
        expected: (u32, u32),
        /// Actual dimensions (width, height)
        actual: (u32, u32),
    },

    /// Channel count outside 1..=4
    #[error("Unsupported channel count {0}, expected 1 to 4")]
    ChannelCount(usize),

    /// A channel index does not exist in the buffer
    #[error("Channel index {index} is out of range for {channels} channel(s)")]
    ChannelOutOfRange { index: usize, channels: usize },

    /// Sample storage length does not match width * height * channels
    #[error("Sample count {actual} does not match the expected {expected}")]
    SampleCount { expected: usize, actual: usize },

    /// Both buffers must share an element type
    #[error("Element type mismatch: {expected} and {actual}")]
    ElementTypeMismatch {
        expected: crate::ElementType,
        actual: crate::ElementType,
    },

    /// Width or height is zero
    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    /// The kernel thread pool could not be created
    #[error("Could not start worker threads: {0}")]
    ThreadPool(String),
}
