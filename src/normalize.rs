//! Geometric and channel normalization of a content/style pair.
//!
//! After [`normalize`] the foreground, mask and background share one size,
//! which is what [`crate::blending::composite`] requires.

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::raster::{ImageRole, Mask, RasterImage};

/// Which image's dimensions the pair is normalized to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeTarget {
    /// Resize the style image to the content image's size.
    #[default]
    Content,
    /// Resize the content image (and its mask) to the style image's size.
    Style,
}

/// Deterministic resampling filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resample {
    /// Nearest-neighbour sampling.
    Nearest,
    /// Bilinear (triangle) sampling.
    #[default]
    Bilinear,
}

impl Resample {
    /// The `image` crate filter implementing this resampling.
    #[must_use]
    pub fn filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Bilinear => FilterType::Triangle,
        }
    }
}

/// A foreground, mask and background of identical dimensions.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Color channels of the content image.
    pub foreground: RgbImage,
    /// Opacity of the foreground, from the content's alpha or fully opaque.
    pub mask: Mask,
    /// Color channels of the style image.
    pub background: RgbImage,
}

impl Normalized {
    /// Common `(width, height)` of all three parts.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.foreground.dimensions()
    }
}

/// Bring a content/style pair to a common size and channel layout.
///
/// A 4-channel `content` is split into foreground and mask; a 3-channel one
/// gets a fully opaque mask. The style image always loses its alpha. The
/// image not selected by `target` is resized to the other's dimensions.
///
/// # Errors
///
/// Returns [`crate::Error::Dimension`] if either image is empty.
pub fn normalize(
    content: RasterImage,
    style: &RasterImage,
    target: ResizeTarget,
    resample: Resample,
) -> Result<Normalized> {
    content.ensure_non_empty(ImageRole::Content)?;
    style.ensure_non_empty(ImageRole::Style)?;

    let (foreground, mask) = content.into_parts();
    let mask = mask.unwrap_or_else(|| Mask::opaque(foreground.width(), foreground.height()));
    let background = style.to_rgb();

    let normalized = match target {
        ResizeTarget::Content => {
            let (width, height) = foreground.dimensions();
            Normalized {
                background: resize_rgb(background, width, height, resample),
                foreground,
                mask,
            }
        }
        ResizeTarget::Style => {
            let (width, height) = background.dimensions();
            Normalized {
                mask: mask.resized(width, height, resample),
                foreground: resize_rgb(foreground, width, height, resample),
                background,
            }
        }
    };

    debug!(
        ?target,
        ?resample,
        width = normalized.foreground.width(),
        height = normalized.foreground.height(),
        "normalized content/style pair"
    );

    Ok(normalized)
}

/// Resize an owned RGB image, passing it through untouched when it already
/// has the requested size.
#[must_use]
pub fn resize_rgb(img: RgbImage, width: u32, height: u32, resample: Resample) -> RgbImage {
    if img.dimensions() == (width, height) {
        return img;
    }
    imageops::resize(&img, width, height, resample.filter())
}
