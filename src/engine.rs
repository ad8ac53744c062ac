//! Core compositing engine.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::blending::{self, AlphaField};
use crate::config::{CompositeConfig, MaskSource};
use crate::encode::{self, OutputFormat, PreviewPayload};
use crate::error::{Error, Result};
use crate::normalize;
use crate::raster::{ImageRole, RasterImage};
use crate::request::{is_supported_image, CompositeRequest};
use crate::segmentation::{self, DeadlineProvider, SegmentationProvider};

/// An encoded composite together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// MIME type matching `bytes`.
    pub mime: &'static str,
}

/// Result of compositing one content file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the content file.
    pub path: PathBuf,
    /// Where the composite was written.
    pub output: PathBuf,
    /// Composite dimensions, when one was produced.
    pub dimensions: Option<(u32, u32)>,
    /// Why processing failed, if it did.
    pub error: Option<Error>,
}

impl ProcessResult {
    /// Whether a composite was written.
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Human-readable status message.
    #[must_use]
    pub fn message(&self) -> String {
        match (&self.error, self.dimensions) {
            (Some(e), _) => e.to_string(),
            (None, Some((w, h))) => format!("Composited {w}x{h}"),
            (None, None) => "Composited".to_string(),
        }
    }
}

/// The compositing engine: configuration plus an optional segmentation
/// provider.
///
/// The engine holds no per-request state. Create once and share it between
/// threads; every call allocates its own buffers.
pub struct CompositeEngine {
    config: CompositeConfig,
    provider: Option<Box<dyn SegmentationProvider>>,
}

impl std::fmt::Debug for CompositeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeEngine")
            .field("config", &self.config)
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .finish()
    }
}

impl CompositeEngine {
    /// Create an engine without a segmentation provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    pub fn new(config: CompositeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider: None,
        })
    }

    /// Attach a segmentation provider, bounded by the configured timeout.
    #[must_use]
    pub fn with_provider<P>(mut self, provider: P) -> Self
    where
        P: SegmentationProvider + 'static,
    {
        let timeout = self.config.segmentation_timeout();
        self.provider = Some(Box::new(DeadlineProvider::new(provider, timeout)));
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    /// Composite a decoded request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dimension`] for empty images and segmentation errors
    /// when the mask comes from the provider.
    pub fn composite(&self, request: CompositeRequest) -> Result<RgbImage> {
        let CompositeRequest { content, style } = request;
        content.ensure_non_empty(ImageRole::Content)?;
        style.ensure_non_empty(ImageRole::Style)?;

        let (content, uniform) = self.foreground_source(content)?;
        let normalized = normalize::normalize(
            content,
            &style,
            self.config.resize_target,
            self.config.resample,
        )?;

        let alpha = match uniform {
            Some(weight) => AlphaField::Uniform(weight),
            None => AlphaField::PerPixel(&normalized.mask),
        };
        let result = blending::composite(&normalized.foreground, alpha, &normalized.background);

        debug!(
            width = result.width(),
            height = result.height(),
            "composite complete"
        );
        Ok(result)
    }

    /// Decode two encoded images and composite them.
    ///
    /// Both images are decoded before any segmentation runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] naming the failing image, then the errors of
    /// [`CompositeEngine::composite`].
    pub fn composite_bytes(&self, content: &[u8], style: &[u8]) -> Result<RgbImage> {
        self.composite(CompositeRequest::decode(content, style)?)
    }

    /// Composite two encoded images and encode the result.
    ///
    /// # Errors
    ///
    /// See [`CompositeEngine::composite_bytes`] and [`encode::encode`].
    pub fn render(
        &self,
        content: &[u8],
        style: &[u8],
        format: OutputFormat,
    ) -> Result<EncodedImage> {
        let result = self.composite_bytes(content, style)?;
        let bytes = encode::encode(&result, format, Some(self.config.jpeg_quality))?;
        Ok(EncodedImage {
            bytes,
            mime: format.mime(),
        })
    }

    /// Composite a request and return base64 PNG previews of both inputs and
    /// the result.
    ///
    /// # Errors
    ///
    /// See [`CompositeEngine::composite`] and [`PreviewPayload::build`].
    pub fn preview(&self, request: &CompositeRequest) -> Result<PreviewPayload> {
        let result = self.composite(request.clone())?;
        PreviewPayload::build(&request.content, &request.style, &result)
    }

    /// Decide what the normalizer sees as content, and whether a uniform
    /// weight replaces the per-pixel mask.
    fn foreground_source(&self, content: RasterImage) -> Result<(RasterImage, Option<f32>)> {
        match self.config.mask_source {
            MaskSource::Embedded => Ok((content, None)),
            MaskSource::Uniform { weight } => {
                let (rgb, _) = content.into_parts();
                Ok((RasterImage::Rgb(rgb), Some(weight)))
            }
            MaskSource::Segmentation => {
                let (rgb, _) = content.into_parts();
                match self.segment(&rgb) {
                    Ok(rgba) => Ok((RasterImage::Rgba(rgba), None)),
                    Err(
                        e @ (Error::SegmentationUnavailable(_) | Error::SegmentationTimeout(_)),
                    ) if self.config.opaque_on_segmentation_failure => {
                        warn!(error = %e, "segmentation failed, using a fully opaque mask");
                        Ok((RasterImage::Rgb(rgb), None))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn segment(&self, rgb: &RgbImage) -> Result<image::RgbaImage> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            Error::SegmentationUnavailable("no segmentation provider configured".into())
        })?;
        segmentation::extract_foreground(&**provider, rgb)
    }

    /// Composite one content file over one style file and save the result.
    ///
    /// The output format follows the output path's extension.
    #[must_use]
    pub fn process_file(&self, content: &Path, style: &Path, output: &Path) -> ProcessResult {
        let outcome = CompositeRequest::open(content, style)
            .and_then(|request| self.composite(request))
            .and_then(|result| self.save(&result, output).map(|()| result.dimensions()));
        self.finish(content, output, outcome)
    }

    /// Composite every supported image in `input_dir` over `style`, writing
    /// results under the same file names in `output_dir`.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        style: &Path,
        output_dir: &Path,
    ) -> Vec<ProcessResult> {
        let failed = |path: &Path, error: Error| {
            vec![ProcessResult {
                path: path.to_path_buf(),
                output: output_dir.to_path_buf(),
                dimensions: None,
                error: Some(error),
            }]
        };

        let style_image = match RasterImage::open(style, ImageRole::Style) {
            Ok(img) => img,
            Err(e) => return failed(style, e),
        };

        let mut entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_ok_and(|ft| ft.is_file()))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => return failed(input_dir, e.into()),
        };
        entries.sort();

        if let Err(e) = std::fs::create_dir_all(output_dir) {
            return failed(output_dir, e.into());
        }

        let run = |input: &PathBuf| {
            let output = input
                .file_name()
                .map_or_else(|| output_dir.to_path_buf(), |name| output_dir.join(name));
            let outcome = RasterImage::open(input, ImageRole::Content)
                .and_then(|content| {
                    self.composite(CompositeRequest::new(content, style_image.clone()))
                })
                .and_then(|result| self.save(&result, &output).map(|()| result.dimensions()));
            self.finish(input, &output, outcome)
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(run).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            entries.iter().map(run).collect()
        }
    }

    fn save(&self, result: &RgbImage, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        encode::save_image(result, output, Some(self.config.jpeg_quality))
    }

    #[allow(clippy::unused_self)]
    fn finish(
        &self,
        input: &Path,
        output: &Path,
        outcome: Result<(u32, u32)>,
    ) -> ProcessResult {
        match outcome {
            Ok(dimensions) => {
                info!(input = %input.display(), output = %output.display(), "composited");
                ProcessResult {
                    path: input.to_path_buf(),
                    output: output.to_path_buf(),
                    dimensions: Some(dimensions),
                    error: None,
                }
            }
            Err(error) => {
                warn!(input = %input.display(), %error, "composite failed");
                ProcessResult {
                    path: input.to_path_buf(),
                    output: output.to_path_buf(),
                    dimensions: None,
                    error: Some(error),
                }
            }
        }
    }
}

/// Generate a default output path from a content path.
///
/// Example: `"photo.png"` becomes `"photo_composite.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_composite.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ResizeTarget;
    use image::{Rgb, Rgba, RgbaImage};

    struct Failing;

    impl SegmentationProvider for Failing {
        fn segment(&self, _image: &RgbImage) -> Result<RgbaImage> {
            Err(Error::SegmentationUnavailable("model not loaded".into()))
        }
    }

    fn config(mask_source: MaskSource) -> CompositeConfig {
        CompositeConfig {
            mask_source,
            ..CompositeConfig::default()
        }
    }

    fn request(content: RasterImage, style: RgbImage) -> CompositeRequest {
        CompositeRequest::new(content, RasterImage::Rgb(style))
    }

    #[test]
    fn default_engine_blends_seventy_thirty() {
        let engine = CompositeEngine::new(CompositeConfig::default()).unwrap();
        let content = RasterImage::Rgb(RgbImage::from_pixel(4, 4, Rgb([100, 200, 0])));
        let out = engine
            .composite(request(content, RgbImage::from_pixel(4, 4, Rgb([200, 0, 100]))))
            .unwrap();
        assert_eq!(out.get_pixel(2, 2), &Rgb([130, 140, 30]));
    }

    #[test]
    fn uniform_mode_ignores_content_alpha() {
        let engine = CompositeEngine::new(config(MaskSource::Uniform { weight: 1.0 })).unwrap();
        let content = RasterImage::Rgba(RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 0])));
        let out = engine.composite(request(content, RgbImage::new(3, 3))).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn embedded_mode_uses_content_alpha() {
        let engine = CompositeEngine::new(config(MaskSource::Embedded)).unwrap();
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([250, 250, 250, 255]));
        img.put_pixel(1, 0, Rgba([250, 250, 250, 0]));
        let out = engine
            .composite(request(RasterImage::Rgba(img), RgbImage::from_pixel(2, 1, Rgb([5, 5, 5]))))
            .unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([250, 250, 250]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([5, 5, 5]));
    }

    #[test]
    fn segmentation_without_provider_is_unavailable() {
        let engine = CompositeEngine::new(config(MaskSource::Segmentation)).unwrap();
        let content = RasterImage::Rgb(RgbImage::new(2, 2));
        let err = engine.composite(request(content, RgbImage::new(2, 2))).unwrap_err();
        assert!(matches!(err, Error::SegmentationUnavailable(_)));
    }

    #[test]
    fn segmentation_failure_propagates_by_default() {
        let engine = CompositeEngine::new(config(MaskSource::Segmentation))
            .unwrap()
            .with_provider(Failing);
        let content = RasterImage::Rgb(RgbImage::new(2, 2));
        let err = engine.composite(request(content, RgbImage::new(2, 2))).unwrap_err();
        assert!(matches!(err, Error::SegmentationUnavailable(_)));
    }

    #[test]
    fn opaque_fallback_requires_opt_in() {
        let engine = CompositeEngine::new(CompositeConfig {
            opaque_on_segmentation_failure: true,
            ..config(MaskSource::Segmentation)
        })
        .unwrap()
        .with_provider(Failing);
        let content = RasterImage::Rgb(RgbImage::from_pixel(2, 2, Rgb([77, 88, 99])));
        let out = engine.composite(request(content, RgbImage::new(2, 2))).unwrap();
        assert_eq!(out.get_pixel(1, 1), &Rgb([77, 88, 99]));
    }

    #[test]
    fn resize_target_style_takes_style_dimensions() {
        let engine = CompositeEngine::new(CompositeConfig {
            resize_target: ResizeTarget::Style,
            ..CompositeConfig::default()
        })
        .unwrap();
        let content = RasterImage::Rgb(RgbImage::new(10, 10));
        let out = engine.composite(request(content, RgbImage::new(30, 20))).unwrap();
        assert_eq!(out.dimensions(), (30, 20));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = CompositeEngine::new(config(MaskSource::Uniform { weight: -0.1 })).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn process_result_messages() {
        let ok = ProcessResult {
            path: PathBuf::from("a.png"),
            output: PathBuf::from("b.png"),
            dimensions: Some((4, 3)),
            error: None,
        };
        assert!(ok.success());
        assert_eq!(ok.message(), "Composited 4x3");

        let failed = ProcessResult {
            error: Some(Error::FileCount(1)),
            dimensions: None,
            ..ok
        };
        assert!(!failed.success());
        assert!(failed.message().contains("exactly 2"));
    }

    #[test]
    fn default_output_path_appends_composite_suffix() {
        let p = default_output_path(Path::new("/tmp/photo.jpg"));
        assert_eq!(p, PathBuf::from("/tmp/photo_composite.jpg"));

        let p = default_output_path(Path::new("image.png"));
        assert_eq!(
            p.file_name().unwrap().to_str().unwrap(),
            "image_composite.png"
        );
    }
}
