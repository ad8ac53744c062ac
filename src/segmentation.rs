//! Boundary to the external foreground segmentation capability.
//!
//! A [`SegmentationProvider`] is a black box: it takes an RGB raster and
//! returns an RGBA raster of the same size whose alpha channel is the
//! foreground mask. [`extract_foreground`] enforces that contract, and
//! [`DeadlineProvider`] bounds how long a call may block.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{Rgba, RgbImage, RgbaImage};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A backend that classifies pixels as foreground or background.
///
/// Implementations must be callable from several threads at once; the
/// pipeline holds no lock around them.
pub trait SegmentationProvider: Send + Sync {
    /// Return `image` with a fourth channel holding the foreground opacity
    /// (0 = background, 255 = foreground).
    ///
    /// # Errors
    ///
    /// [`Error::SegmentationUnavailable`] when the backend cannot run, or
    /// [`Error::SegmentationTimeout`] when it exceeds its budget.
    fn segment(&self, image: &RgbImage) -> Result<RgbaImage>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "segmentation"
    }
}

impl<P: SegmentationProvider + ?Sized> SegmentationProvider for Arc<P> {
    fn segment(&self, image: &RgbImage) -> Result<RgbaImage> {
        (**self).segment(image)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<P: SegmentationProvider + ?Sized> SegmentationProvider for Box<P> {
    fn segment(&self, image: &RgbImage) -> Result<RgbaImage> {
        (**self).segment(image)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Run `provider` on `image` and check that the result matches its size.
///
/// Provider errors propagate unchanged; nothing is retried.
///
/// # Errors
///
/// Any provider error, or [`Error::DimensionMismatch`] if the returned raster
/// does not have the input's dimensions.
pub fn extract_foreground<P>(provider: &P, image: &RgbImage) -> Result<RgbaImage>
where
    P: SegmentationProvider + ?Sized,
{
    debug!(
        provider = provider.name(),
        width = image.width(),
        height = image.height(),
        "running segmentation"
    );
    let segmented = provider.segment(image)?;
    if segmented.dimensions() != image.dimensions() {
        return Err(Error::DimensionMismatch {
            expected: image.dimensions(),
            actual: segmented.dimensions(),
        });
    }
    Ok(segmented)
}

/// Wraps a provider so each call fails with [`Error::SegmentationTimeout`]
/// once `timeout` has elapsed.
///
/// The wrapped call runs on its own thread with a private copy of the image.
/// After a timeout the caller returns immediately; the worker finishes on its
/// own and its late result is discarded.
#[derive(Debug)]
pub struct DeadlineProvider<P> {
    inner: Arc<P>,
    timeout: Duration,
}

impl<P> DeadlineProvider<P>
where
    P: SegmentationProvider + 'static,
{
    /// Bound `inner` by `timeout`.
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    /// The configured time budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<P> SegmentationProvider for DeadlineProvider<P>
where
    P: SegmentationProvider + 'static,
{
    fn segment(&self, image: &RgbImage) -> Result<RgbaImage> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned = image.clone();

        thread::Builder::new()
            .name("segmentation".into())
            .spawn(move || {
                // The receiver is gone after a timeout; the send error is expected then.
                let _ = tx.send(inner.segment(&owned));
            })
            .map_err(|e| Error::SegmentationUnavailable(format!("failed to spawn worker: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    provider = self.inner.name(),
                    timeout_ms = self.timeout.as_millis(),
                    "segmentation timed out"
                );
                Err(Error::SegmentationTimeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::SegmentationUnavailable(format!(
                "{} worker exited without a result",
                self.inner.name()
            ))),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Deterministic colour keyer: pixels close to `key` become background.
///
/// Opacity is 0 within `tolerance` of the key (Euclidean RGB distance), 255
/// beyond `tolerance + softness`, and linear in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromaKeyProvider {
    /// Background colour to remove.
    pub key: [u8; 3],
    /// Distance up to which a pixel is fully background.
    pub tolerance: f32,
    /// Width of the soft edge beyond `tolerance`.
    pub softness: f32,
}

impl Default for ChromaKeyProvider {
    fn default() -> Self {
        Self {
            key: [0, 255, 0],
            tolerance: 60.0,
            softness: 40.0,
        }
    }
}

impl ChromaKeyProvider {
    /// Key out `key` with the default edge parameters.
    #[must_use]
    pub fn new(key: [u8; 3]) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn opacity(&self, px: [u8; 3]) -> u8 {
        let distance = px
            .iter()
            .zip(self.key)
            .map(|(&c, k)| {
                let d = f32::from(c) - f32::from(k);
                d * d
            })
            .sum::<f32>()
            .sqrt();

        if distance <= self.tolerance {
            return 0;
        }
        if self.softness <= 0.0 || distance >= self.tolerance + self.softness {
            return 255;
        }
        let t = (distance - self.tolerance) / self.softness;
        (t * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

impl SegmentationProvider for ChromaKeyProvider {
    fn segment(&self, image: &RgbImage) -> Result<RgbaImage> {
        Ok(RgbaImage::from_fn(image.width(), image.height(), |x, y| {
            let px = image.get_pixel(x, y).0;
            Rgba([px[0], px[1], px[2], self.opacity(px)])
        }))
    }

    fn name(&self) -> &str {
        "chroma-key"
    }
}
