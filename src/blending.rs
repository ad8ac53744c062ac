//! Alpha blending math for compositing.
//!
//! Every pipeline variant reduces to one forward blend:
//! `result = alpha * foreground + (1 - alpha) * background`
//!
//! The alpha comes either from a per-pixel [`Mask`] or from one uniform weight
//! applied to every pixel, expressed by [`AlphaField`].

use image::{Rgb, RgbImage};

use crate::raster::Mask;

/// Source of the blend weight for each pixel.
#[derive(Debug, Clone, Copy)]
pub enum AlphaField<'a> {
    /// Weight taken from the mask, `value / 255`.
    PerPixel(&'a Mask),
    /// The same foreground weight everywhere, clamped to `[0.0, 1.0]`.
    Uniform(f32),
}

impl AlphaField<'_> {
    /// Foreground weight at `(x, y)`.
    #[must_use]
    pub fn at(&self, x: u32, y: u32) -> f32 {
        match self {
            Self::PerPixel(mask) => mask.opacity(x, y),
            Self::Uniform(weight) => weight.clamp(0.0, 1.0),
        }
    }
}

/// Blend one channel value. Rounds to nearest and clamps to the `u8` range.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blend_channel(foreground: u8, background: u8, alpha: f32) -> u8 {
    let value = f32::from(foreground) * alpha + f32::from(background) * (1.0 - alpha);
    value.round().clamp(0.0, 255.0) as u8
}

/// Composite `foreground` over `background`.
///
/// The result has the foreground's dimensions and is always 3-channel.
/// Swapping the two images changes the result unless alpha is 0.5.
///
/// # Panics
///
/// Panics if `foreground`, `background` and a per-pixel mask do not share the
/// same dimensions. [`crate::normalize::normalize`] guarantees they do.
#[must_use]
pub fn composite(foreground: &RgbImage, alpha: AlphaField<'_>, background: &RgbImage) -> RgbImage {
    assert_eq!(
        foreground.dimensions(),
        background.dimensions(),
        "foreground and background must share dimensions"
    );
    if let AlphaField::PerPixel(mask) = alpha {
        assert_eq!(
            foreground.dimensions(),
            mask.dimensions(),
            "mask must share the foreground's dimensions"
        );
    }

    RgbImage::from_fn(foreground.width(), foreground.height(), |x, y| {
        let a = alpha.at(x, y);
        let fg = foreground.get_pixel(x, y);
        let bg = background.get_pixel(x, y);
        Rgb([
            blend_channel(fg[0], bg[0], a),
            blend_channel(fg[1], bg[1], a),
            blend_channel(fg[2], bg[2], a),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[allow(clippy::cast_possible_truncation)]
    fn gradient(width: u32, height: u32, seed: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = |k: u32| ((x * 37 + y * 11 + seed * k) % 256) as u8;
            Rgb([v(3), v(7), v(13)])
        })
    }

    #[test]
    fn zero_mask_yields_background_exactly() {
        let fg = gradient(16, 9, 1);
        let bg = gradient(16, 9, 5);
        let mask = Mask::uniform(16, 9, 0);

        assert_eq!(composite(&fg, AlphaField::PerPixel(&mask), &bg), bg);
    }

    #[test]
    fn full_mask_yields_foreground_exactly() {
        let fg = gradient(16, 9, 2);
        let bg = gradient(16, 9, 9);
        let mask = Mask::opaque(16, 9);

        assert_eq!(composite(&fg, AlphaField::PerPixel(&mask), &bg), fg);
    }

    #[test]
    fn uniform_weight_matches_formula() {
        let fg = gradient(20, 15, 3);
        let bg = gradient(20, 15, 4);
        let out = composite(&fg, AlphaField::Uniform(0.7), &bg);

        for (x, y, px) in out.enumerate_pixels() {
            let f = fg.get_pixel(x, y);
            let b = bg.get_pixel(x, y);
            for ch in 0..3 {
                let expected = (f32::from(f[ch]) * 0.7 + f32::from(b[ch]) * 0.3).round();
                assert!((f32::from(px[ch]) - expected).abs() < f32::EPSILON);
            }
        }
    }

    #[test]
    fn uniform_weight_equals_constant_mask() {
        let fg = gradient(8, 8, 6);
        let bg = gradient(8, 8, 7);
        let mask = Mask::uniform(8, 8, 51);

        assert_eq!(
            composite(&fg, AlphaField::Uniform(0.2), &bg),
            composite(&fg, AlphaField::PerPixel(&mask), &bg)
        );
    }

    #[test]
    fn out_of_range_uniform_weight_is_clamped() {
        let fg = gradient(4, 4, 1);
        let bg = gradient(4, 4, 2);
        assert_eq!(composite(&fg, AlphaField::Uniform(3.0), &bg), fg);
        assert_eq!(composite(&fg, AlphaField::Uniform(-1.0), &bg), bg);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn extremes_never_overflow() {
        let white = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let black = RgbImage::new(4, 4);
        let mask = Mask::from_gray(image::GrayImage::from_fn(4, 4, |x, y| {
            Luma([((x * 4 + y) * 17) as u8])
        }));

        let out = composite(&white, AlphaField::PerPixel(&mask), &black);
        for (x, y, px) in out.enumerate_pixels() {
            assert_eq!(px[0], mask.value(x, y));
        }
        let out = composite(&black, AlphaField::PerPixel(&mask), &white);
        for (x, y, px) in out.enumerate_pixels() {
            assert_eq!(px[1], 255 - mask.value(x, y));
        }
    }

    #[test]
    fn blending_is_not_commutative() {
        let fg = RgbImage::from_pixel(2, 2, Rgb([200, 200, 200]));
        let bg = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        let forward = composite(&fg, AlphaField::Uniform(0.7), &bg);
        let swapped = composite(&bg, AlphaField::Uniform(0.7), &fg);
        assert_eq!(forward.get_pixel(0, 0), &Rgb([140, 140, 140]));
        assert_eq!(swapped.get_pixel(0, 0), &Rgb([60, 60, 60]));
    }

    #[test]
    fn blend_channel_rounds_to_nearest() {
        assert_eq!(blend_channel(201, 100, 0.5), 151);
        assert_eq!(blend_channel(255, 0, 0.5), 128);
        assert_eq!(blend_channel(10, 20, 0.0), 20);
    }

    #[test]
    #[should_panic(expected = "share dimensions")]
    fn mismatched_sizes_panic() {
        let fg = RgbImage::new(4, 4);
        let bg = RgbImage::new(5, 4);
        let _ = composite(&fg, AlphaField::Uniform(0.5), &bg);
    }
}
