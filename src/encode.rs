//! Serialization of composites for transport.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::RasterImage;

/// JPEG quality used when the caller does not pick one.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Wire format of an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy, alpha-free.
    Jpeg,
    /// Lossless.
    Png,
}

impl OutputFormat {
    /// MIME type to declare alongside the bytes.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Canonical file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Match a file extension, case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Match a MIME type such as `image/png`.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Pick the format from a path's extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for anything but JPEG or PNG.
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))
    }
}

/// Encode an RGB image.
///
/// `quality` applies to JPEG only and defaults to [`DEFAULT_JPEG_QUALITY`].
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the image is empty or the encoder fails,
/// and [`Error::InvalidConfig`] for a quality outside 1-100.
pub fn encode(image: &RgbImage, format: OutputFormat, quality: Option<u8>) -> Result<Vec<u8>> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Encoding(format!(
            "cannot encode empty {}x{} image",
            image.width(),
            image.height()
        )));
    }

    match format {
        OutputFormat::Jpeg => {
            let quality = quality.unwrap_or(DEFAULT_JPEG_QUALITY);
            if !(1..=100).contains(&quality) {
                return Err(Error::InvalidConfig(format!(
                    "JPEG quality must be between 1 and 100, got {quality}"
                )));
            }
            let mut out = Vec::new();
            JpegEncoder::new_with_quality(&mut out, quality)
                .encode_image(image)
                .map_err(|e| Error::Encoding(e.to_string()))?;
            Ok(out)
        }
        OutputFormat::Png => png_bytes(&DynamicImage::ImageRgb8(image.clone())),
    }
}

/// Encode as PNG and wrap in standard base64 for textual transports.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_base64_png(image: &RgbImage) -> Result<String> {
    let bytes = encode(image, OutputFormat::Png, None)?;
    Ok(STANDARD.encode(bytes))
}

fn png_bytes(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(out.into_inner())
}

/// Write an RGB image to `path`, choosing the format from its extension.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for extensions other than JPEG/PNG,
/// [`Error::Io`] if writing fails, and the errors of [`encode`].
pub fn save_image(image: &RgbImage, path: &Path, quality: Option<u8>) -> Result<()> {
    let format = OutputFormat::from_path(path)?;
    let bytes = encode(image, format, quality)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Three base64 PNG previews: the two inputs and the composite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewPayload {
    /// The content image as received.
    pub content: String,
    /// The style image as received.
    pub style: String,
    /// The composite.
    pub result: String,
}

impl PreviewPayload {
    /// Encode all three images.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if any image fails to encode.
    pub fn build(content: &RasterImage, style: &RasterImage, result: &RgbImage) -> Result<Self> {
        Ok(Self {
            content: STANDARD.encode(png_bytes(&content.to_dynamic())?),
            style: STANDARD.encode(png_bytes(&style.to_dynamic())?),
            result: encode_base64_png(result)?,
        })
    }

    /// Serialize to a JSON object with `content`, `style` and `result` keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
