//! Error types for the style-composite crate.

use std::time::Duration;

use crate::raster::ImageRole;

/// Errors that can occur while compositing a content image over a style image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input bytes are not a decodable JPEG or PNG raster.
    #[error("failed to decode {role} image: {source}")]
    Decode {
        /// Which image failed to decode.
        role: ImageRole,
        /// Underlying decoder error.
        #[source]
        source: image::ImageError,
    },

    /// An image has zero width or height.
    #[error("{role} image has invalid dimensions {width}x{height}")]
    Dimension {
        /// Which image is malformed.
        role: ImageRole,
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// The segmentation provider returned a raster of the wrong size.
    #[error(
        "segmentation output is {}x{}, expected {}x{}",
        .actual.0, .actual.1, .expected.0, .expected.1
    )]
    DimensionMismatch {
        /// Dimensions of the image handed to the provider.
        expected: (u32, u32),
        /// Dimensions the provider returned.
        actual: (u32, u32),
    },

    /// An image has a channel count other than 3 (RGB) or 4 (RGBA).
    #[error("{role} image has {channels} channel(s), expected 3 or 4")]
    UnsupportedChannels {
        /// Which image has the unsupported layout.
        role: ImageRole,
        /// Channel count found in the decoded image.
        channels: u8,
    },

    /// The segmentation backend is not loaded or failed to run.
    #[error("segmentation unavailable: {0}")]
    SegmentationUnavailable(String),

    /// The segmentation backend did not answer within its time budget.
    #[error("segmentation timed out after {}ms", .0.as_millis())]
    SegmentationTimeout(Duration),

    /// Serializing the composite failed.
    #[error("failed to encode result: {0}")]
    Encoding(String),

    /// A request did not carry exactly two images.
    #[error("exactly 2 images required, got {0}")]
    FileCount(usize),

    /// The file extension or content type is not JPEG or PNG.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The image this error concerns, when it concerns a specific one.
    #[must_use]
    pub fn role(&self) -> Option<ImageRole> {
        match self {
            Self::Decode { role, .. }
            | Self::Dimension { role, .. }
            | Self::UnsupportedChannels { role, .. } => Some(*role),
            Self::DimensionMismatch { .. } => Some(ImageRole::Content),
            Self::Encoding(_) => Some(ImageRole::Result),
            _ => None,
        }
    }

    /// Whether the failure was caused by the caller's input rather than by
    /// the pipeline or its collaborators.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::Dimension { .. }
                | Self::UnsupportedChannels { .. }
                | Self::FileCount(_)
                | Self::UnsupportedFormat(_)
                | Self::InvalidConfig(_)
                | Self::Config(_)
        )
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
