//! In-memory raster types shared by every pipeline stage.
//!
//! A [`RasterImage`] is either 3-channel RGB or 4-channel RGBA, always 8 bits
//! per channel. A [`Mask`] is the single-channel opacity grid that governs how
//! much foreground shows through at compositing time.

use std::fmt;
use std::path::Path;

use image::{imageops, DynamicImage, GrayImage, Luma, Rgb, RgbImage, RgbaImage};

use crate::error::{Error, Result};
use crate::normalize::Resample;

/// Which image of a composite request a value or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageRole {
    /// The subject image, composited on top.
    Content,
    /// The background image.
    Style,
    /// The blended output.
    Result,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Content => "content",
            Self::Style => "style",
            Self::Result => "result",
        })
    }
}

/// A decoded 8-bit raster with either 3 or 4 channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterImage {
    /// Color only.
    Rgb(RgbImage),
    /// Color plus an opacity channel.
    Rgba(RgbaImage),
}

impl RasterImage {
    /// Decode JPEG or PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not a valid raster, and the
    /// errors of [`RasterImage::from_dynamic`] for unusable layouts.
    pub fn decode(bytes: &[u8], role: ImageRole) -> Result<Self> {
        let img =
            image::load_from_memory(bytes).map_err(|source| Error::Decode { role, source })?;
        Self::from_dynamic(img, role)
    }

    /// Read and decode an image file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise the errors
    /// of [`RasterImage::decode`].
    pub fn open(path: &Path, role: ImageRole) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes, role)
    }

    /// Convert a decoded image, keeping 3- and 4-channel layouts and reducing
    /// higher bit depths to 8 bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dimension`] for zero-sized images and
    /// [`Error::UnsupportedChannels`] for grayscale inputs.
    pub fn from_dynamic(img: DynamicImage, role: ImageRole) -> Result<Self> {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(Error::Dimension {
                role,
                width,
                height,
            });
        }

        match img.color().channel_count() {
            3 => Ok(Self::Rgb(img.into_rgb8())),
            4 => Ok(Self::Rgba(img.into_rgba8())),
            channels => Err(Error::UnsupportedChannels { role, channels }),
        }
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Rgb(img) => img.width(),
            Self::Rgba(img) => img.width(),
        }
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        match self {
            Self::Rgb(img) => img.height(),
            Self::Rgba(img) => img.height(),
        }
    }

    /// `(width, height)` in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Number of channels, 3 or 4.
    #[must_use]
    pub fn channels(&self) -> u8 {
        match self {
            Self::Rgb(_) => 3,
            Self::Rgba(_) => 4,
        }
    }

    /// Fail with [`Error::Dimension`] if the image is empty.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn ensure_non_empty(&self, role: ImageRole) -> Result<()> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Dimension {
                role,
                width,
                height,
            });
        }
        Ok(())
    }

    /// Color channels only, as an owned copy.
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Self::Rgb(img) => img.clone(),
            Self::Rgba(img) => drop_alpha(img),
        }
    }

    /// Split into color channels and, when present, the opacity channel.
    #[must_use]
    pub fn into_parts(self) -> (RgbImage, Option<Mask>) {
        match self {
            Self::Rgb(img) => (img, None),
            Self::Rgba(img) => (drop_alpha(&img), Some(Mask::from_alpha(&img))),
        }
    }

    /// View as a [`DynamicImage`] for encoding.
    #[must_use]
    pub fn to_dynamic(&self) -> DynamicImage {
        match self {
            Self::Rgb(img) => DynamicImage::ImageRgb8(img.clone()),
            Self::Rgba(img) => DynamicImage::ImageRgba8(img.clone()),
        }
    }
}

impl From<RgbImage> for RasterImage {
    fn from(img: RgbImage) -> Self {
        Self::Rgb(img)
    }
}

impl From<RgbaImage> for RasterImage {
    fn from(img: RgbaImage) -> Self {
        Self::Rgba(img)
    }
}

fn drop_alpha(img: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let px = img.get_pixel(x, y);
        Rgb([px[0], px[1], px[2]])
    })
}

/// Single-channel opacity grid: 0 is pure background, 255 pure foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    /// A fully opaque mask (every value 255).
    #[must_use]
    pub fn opaque(width: u32, height: u32) -> Self {
        Self::uniform(width, height, 255)
    }

    /// A mask holding the same value everywhere.
    #[must_use]
    pub fn uniform(width: u32, height: u32, value: u8) -> Self {
        Self(GrayImage::from_pixel(width, height, Luma([value])))
    }

    /// Extract the fourth channel of an RGBA image.
    #[must_use]
    pub fn from_alpha(img: &RgbaImage) -> Self {
        Self(GrayImage::from_fn(img.width(), img.height(), |x, y| {
            Luma([img.get_pixel(x, y)[3]])
        }))
    }

    /// Wrap an existing grayscale buffer.
    #[must_use]
    pub fn from_gray(gray: GrayImage) -> Self {
        Self(gray)
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// `(width, height)` in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    /// Raw mask value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn value(&self, x: u32, y: u32) -> u8 {
        self.0.get_pixel(x, y)[0]
    }

    /// Mask value at `(x, y)` normalized to `[0.0, 1.0]`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn opacity(&self, x: u32, y: u32) -> f32 {
        f32::from(self.value(x, y)) / 255.0
    }

    /// Resample to a new size. Returns a copy when the size already matches.
    #[must_use]
    pub fn resized(&self, width: u32, height: u32, resample: Resample) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self(imageops::resize(&self.0, width, height, resample.filter()))
    }

    /// Borrow the underlying grayscale buffer.
    #[must_use]
    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    /// Take the underlying grayscale buffer.
    #[must_use]
    pub fn into_gray(self) -> GrayImage {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, Rgba};

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decode_keeps_rgb_and_rgba_layouts() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([1, 2, 3])));
        let decoded = RasterImage::decode(&png_bytes(&rgb), ImageRole::Content).unwrap();
        assert_eq!(decoded.channels(), 3);
        assert_eq!(decoded.dimensions(), (4, 3));

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 5, Rgba([9, 8, 7, 6])));
        let decoded = RasterImage::decode(&png_bytes(&rgba), ImageRole::Style).unwrap();
        assert_eq!(decoded.channels(), 4);
        assert_eq!(decoded.dimensions(), (2, 5));
    }

    #[test]
    fn decode_rejects_corrupt_bytes_with_role() {
        let err = RasterImage::decode(b"definitely not an image", ImageRole::Style).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                role: ImageRole::Style,
                ..
            }
        ));
    }

    #[test]
    fn grayscale_is_unsupported() {
        let gray = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(3, 3, LumaA([10, 255])));
        let err = RasterImage::from_dynamic(gray, ImageRole::Content).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedChannels { channels: 2, .. }
        ));
    }

    #[test]
    fn zero_sized_image_is_a_dimension_error() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
        let err = RasterImage::from_dynamic(empty, ImageRole::Content).unwrap_err();
        assert!(matches!(
            err,
            Error::Dimension {
                width: 0,
                height: 10,
                ..
            }
        ));
    }

    #[test]
    fn into_parts_splits_alpha() {
        let img = RgbaImage::from_fn(3, 2, |x, _| Rgba([10, 20, 30, (x * 100) as u8]));
        let (rgb, mask) = RasterImage::Rgba(img).into_parts();
        let mask = mask.unwrap();
        assert_eq!(rgb.get_pixel(2, 1), &Rgb([10, 20, 30]));
        assert_eq!(mask.value(0, 0), 0);
        assert_eq!(mask.value(2, 1), 200);

        let (_, none) = RasterImage::Rgb(RgbImage::new(2, 2)).into_parts();
        assert!(none.is_none());
    }

    #[test]
    fn opacity_is_normalized() {
        let mask = Mask::uniform(2, 2, 51);
        assert!((mask.opacity(1, 1) - 0.2).abs() < 1e-6);
        assert!((Mask::opaque(1, 1).opacity(0, 0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn mask_resize_changes_shape() {
        let mask = Mask::uniform(10, 10, 128);
        let resized = mask.resized(20, 5, Resample::Bilinear);
        assert_eq!(resized.dimensions(), (20, 5));
        assert_eq!(resized.value(7, 3), 128);
    }
}
