//! Boundary checks for incoming composite requests.

use std::path::Path;

use crate::encode::OutputFormat;
use crate::error::{Error, Result};
use crate::raster::{ImageRole, RasterImage};

/// One uploaded file as received by a transport adapter.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name.
    pub file_name: String,
    /// Declared content type, if the transport carries one.
    pub content_type: Option<String>,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl Upload {
    /// An upload without a declared content type.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    /// Attach a declared content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn check_format(&self, role: ImageRole) -> Result<()> {
        if !is_supported_image(Path::new(&self.file_name)) {
            return Err(Error::UnsupportedFormat(format!(
                "{role} file '{}' must be .jpg, .jpeg or .png",
                self.file_name
            )));
        }
        if let Some(content_type) = &self.content_type {
            if OutputFormat::from_mime(content_type).is_none() {
                return Err(Error::UnsupportedFormat(format!(
                    "{role} file '{}' has content type {content_type}",
                    self.file_name
                )));
            }
        }
        Ok(())
    }
}

/// A decoded content/style pair, owned for the duration of one composite.
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    /// The subject image.
    pub content: RasterImage,
    /// The background image.
    pub style: RasterImage,
}

impl CompositeRequest {
    /// Pair two already decoded images.
    #[must_use]
    pub fn new(content: RasterImage, style: RasterImage) -> Self {
        Self { content, style }
    }

    /// Decode a pair of encoded images. The content image is decoded first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] naming the image that failed.
    pub fn decode(content: &[u8], style: &[u8]) -> Result<Self> {
        let content = RasterImage::decode(content, ImageRole::Content)?;
        let style = RasterImage::decode(style, ImageRole::Style)?;
        Ok(Self { content, style })
    }

    /// Read and decode two image files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Decode`].
    pub fn open(content: &Path, style: &Path) -> Result<Self> {
        let content = RasterImage::open(content, ImageRole::Content)?;
        let style = RasterImage::open(style, ImageRole::Style)?;
        Ok(Self { content, style })
    }

    /// Validate and decode exactly two uploads, content first.
    ///
    /// # Errors
    ///
    /// [`Error::FileCount`] unless exactly two uploads are given,
    /// [`Error::UnsupportedFormat`] for files that are not JPEG or PNG, and
    /// [`Error::Decode`] for undecodable bytes.
    pub fn from_uploads(uploads: Vec<Upload>) -> Result<Self> {
        let [content, style]: [Upload; 2] = uploads
            .try_into()
            .map_err(|rest: Vec<Upload>| Error::FileCount(rest.len()))?;

        content.check_format(ImageRole::Content)?;
        style.check_format(ImageRole::Style)?;
        Self::decode(&content.bytes, &style.bytes)
    }
}

/// Check if a file has a JPEG or PNG extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(OutputFormat::from_extension)
        .is_some()
}
