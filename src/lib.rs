//! Cut a subject out of a content image and composite it over a style image.
//!
//! The pipeline is strictly one-way and stateless:
//! decode → (optional) segmentation → normalize → alpha composite → encode.
//! Every variant (mask from segmentation, mask from the content's own alpha,
//! or one fixed weight for every pixel) goes through the same blend
//! primitive, [`blending::composite`].
//!
//! # Quick Start
//!
//! ```no_run
//! use style_composite::{CompositeConfig, CompositeEngine, OutputFormat};
//!
//! let engine = CompositeEngine::new(CompositeConfig::default()).expect("valid config");
//! let content = std::fs::read("subject.png").unwrap();
//! let style = std::fs::read("scene.jpg").unwrap();
//! let encoded = engine.render(&content, &style, OutputFormat::Jpeg).unwrap();
//! std::fs::write("out.jpg", &encoded.bytes).unwrap();
//! ```
//!
//! # Segmentation
//!
//! With [`MaskSource::Segmentation`] the mask comes from a
//! [`SegmentationProvider`]. Calls are bounded by the configured timeout and
//! failures propagate unless the opaque fallback is explicitly enabled.
//!
//! ```no_run
//! use style_composite::{ChromaKeyProvider, CompositeConfig, CompositeEngine, MaskSource};
//!
//! let config = CompositeConfig {
//!     mask_source: MaskSource::Segmentation,
//!     ..CompositeConfig::default()
//! };
//! let engine = CompositeEngine::new(config)
//!     .expect("valid config")
//!     .with_provider(ChromaKeyProvider::new([0, 255, 0]));
//! let result = engine.process_file(
//!     "greenscreen.png".as_ref(),
//!     "beach.jpg".as_ref(),
//!     "out.png".as_ref(),
//! );
//! println!("{}", result.message());
//! ```

#![deny(missing_docs)]

pub mod blending;
pub mod config;
pub mod encode;
mod engine;
pub mod error;
pub mod normalize;
pub mod raster;
pub mod request;
pub mod segmentation;

pub use config::{CompositeConfig, MaskSource};
pub use encode::{encode, save_image, OutputFormat, PreviewPayload, DEFAULT_JPEG_QUALITY};
pub use engine::{default_output_path, CompositeEngine, EncodedImage, ProcessResult};
pub use error::{Error, Result};
pub use normalize::{normalize, Normalized, Resample, ResizeTarget};
pub use raster::{ImageRole, Mask, RasterImage};
pub use request::{is_supported_image, CompositeRequest, Upload};
pub use segmentation::{ChromaKeyProvider, DeadlineProvider, SegmentationProvider};
