//! Pipeline configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::encode::DEFAULT_JPEG_QUALITY;
use crate::error::{Error, Result};
use crate::normalize::{Resample, ResizeTarget};

/// Foreground weight used by the fixed-weight blend when none is given.
pub const DEFAULT_UNIFORM_WEIGHT: f32 = 0.7;

/// Default time budget for one segmentation call, in milliseconds.
pub const DEFAULT_SEGMENTATION_TIMEOUT_MS: u64 = 30_000;

/// How the foreground opacity is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaskSource {
    /// Use the content image's own alpha channel, or full opacity without one.
    Embedded,
    /// Ask the segmentation provider for a mask.
    Segmentation,
    /// Blend every pixel with the same foreground weight.
    Uniform {
        /// Foreground weight in `[0.0, 1.0]`; the background gets `1 - weight`.
        weight: f32,
    },
}

impl Default for MaskSource {
    fn default() -> Self {
        Self::Uniform {
            weight: DEFAULT_UNIFORM_WEIGHT,
        }
    }
}

/// Options controlling one composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Where the blend weights come from.
    pub mask_source: MaskSource,
    /// Which image's dimensions the result takes.
    pub resize_target: ResizeTarget,
    /// Resampling filter used when resizing.
    pub resample: Resample,
    /// JPEG quality (1-100) for JPEG output.
    pub jpeg_quality: u8,
    /// Time budget for one segmentation call, in milliseconds.
    pub segmentation_timeout_ms: u64,
    /// Treat the whole content image as foreground when segmentation fails.
    ///
    /// Off by default: a silent fallback changes the visible output.
    pub opaque_on_segmentation_failure: bool,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            mask_source: MaskSource::default(),
            resize_target: ResizeTarget::default(),
            resample: Resample::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            segmentation_timeout_ms: DEFAULT_SEGMENTATION_TIMEOUT_MS,
            opaque_on_segmentation_failure: false,
        }
    }
}

impl CompositeConfig {
    /// Load and validate a JSON configuration file. Missing fields take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file cannot be read, [`Error::Config`] if it is
    /// not valid JSON, and the errors of [`CompositeConfig::validate`].
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON configuration string.
    ///
    /// # Errors
    ///
    /// See [`CompositeConfig::from_json_file`].
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if let MaskSource::Uniform { weight } = self.mask_source {
            if !(0.0..=1.0).contains(&weight) {
                return Err(Error::InvalidConfig(format!(
                    "uniform weight must be between 0.0 and 1.0, got {weight}"
                )));
            }
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::InvalidConfig(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.segmentation_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "segmentation_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// The segmentation budget as a [`Duration`].
    #[must_use]
    pub fn segmentation_timeout(&self) -> Duration {
        Duration::from_millis(self.segmentation_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_blend_seventy_thirty() {
        let config = CompositeConfig::default();
        assert_eq!(config.mask_source, MaskSource::Uniform { weight: 0.7 });
        assert_eq!(config.resize_target, ResizeTarget::Content);
        assert_eq!(config.jpeg_quality, 90);
        assert!(!config.opaque_on_segmentation_failure);
        assert_eq!(config.segmentation_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = CompositeConfig::from_json(
            r#"{"mask_source": {"kind": "segmentation"}, "resize_target": "style"}"#,
        )
        .unwrap();
        assert_eq!(config.mask_source, MaskSource::Segmentation);
        assert_eq!(config.resize_target, ResizeTarget::Style);
        assert_eq!(config.resample, Resample::Bilinear);
        assert_eq!(config.jpeg_quality, 90);
    }

    #[test]
    fn json_uniform_weight_round_trips() {
        let config = CompositeConfig {
            mask_source: MaskSource::Uniform { weight: 0.25 },
            resample: Resample::Nearest,
            ..CompositeConfig::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        assert!(text.contains(r#""kind":"uniform""#));
        assert_eq!(CompositeConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let weight = CompositeConfig {
            mask_source: MaskSource::Uniform { weight: 1.5 },
            ..CompositeConfig::default()
        };
        assert!(matches!(weight.validate(), Err(Error::InvalidConfig(_))));

        let quality = CompositeConfig {
            jpeg_quality: 0,
            ..CompositeConfig::default()
        };
        assert!(matches!(quality.validate(), Err(Error::InvalidConfig(_))));

        let timeout = CompositeConfig {
            segmentation_timeout_ms: 0,
            ..CompositeConfig::default()
        };
        assert!(matches!(timeout.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            CompositeConfig::from_json("{ not json"),
            Err(Error::Config(_))
        ));
    }
}
