//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three stages of one compression
//! pass: decode, render onto a raster surface, and encode. The compressor
//! drives them; the backend does the pixel work.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) — pure Rust, everything
//! statically linked into the binary.

use super::params::{EncodeParams, RenderParams};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Failed to read input: {0}")]
    ResourceRead(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Raster surface unavailable: {0}")]
    SurfaceAcquisition(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Unsupported media type: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid compression request: {0}")]
    InvalidRequest(String),
}

/// Pixel dimensions of a decoded image or raster surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// An image file as handed over by the caller: raw bytes plus declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl ImageFile {
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Self {
        Self { bytes, format }
    }

    /// Build from bytes and a MIME type such as `image/jpeg`.
    pub fn from_mime(bytes: Vec<u8>, mime: &str) -> Result<Self, CompressError> {
        let format = ImageFormat::from_mime_type(mime)
            .ok_or_else(|| CompressError::UnsupportedFormat(mime.to_string()))?;
        Ok(Self::new(bytes, format))
    }

    /// Read a file from disk.
    ///
    /// The media type comes from the extension, falling back to sniffing the
    /// first bytes when the extension is missing or unknown.
    pub fn open(path: &Path) -> Result<Self, CompressError> {
        let bytes = std::fs::read(path)?;
        let format = match ImageFormat::from_path(path) {
            Ok(format) => format,
            Err(_) => image::guess_format(&bytes).map_err(|_| {
                CompressError::UnsupportedFormat(format!(
                    "cannot determine media type of {}",
                    path.display()
                ))
            })?,
        };
        Ok(Self::new(bytes, format))
    }

    /// Read a whole stream into memory.
    pub fn read_from(mut reader: impl Read, format: ImageFormat) -> Result<Self, CompressError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::new(bytes, format))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Compressed output. Borrows the input buffer when no re-encode happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob<'a> {
    bytes: Cow<'a, [u8]>,
    format: ImageFormat,
}

impl<'a> Blob<'a> {
    pub fn borrowed(bytes: &'a [u8], format: ImageFormat) -> Self {
        Self {
            bytes: Cow::Borrowed(bytes),
            format,
        }
    }

    pub fn owned(bytes: Vec<u8>, format: ImageFormat) -> Blob<'static> {
        Blob {
            bytes: Cow::Owned(bytes),
            format,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when this blob is the caller's original buffer.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.bytes, Cow::Borrowed(_))
    }

    pub fn into_owned(self) -> Blob<'static> {
        Blob {
            bytes: Cow::Owned(self.bytes.into_owned()),
            format: self.format,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_owned()
    }
}

/// Trait for image processing backends.
///
/// `Surface` is whatever raster representation the backend works on. It is
/// created by [`decode`](Self::decode), replaced by [`render`](Self::render)
/// and read (never mutated) by [`encode`](Self::encode). Each compression
/// attempt runs all three in order.
pub trait ImageBackend: Sync {
    type Surface;

    /// Decode the file into a raster.
    fn decode(&self, file: &ImageFile) -> Result<Self::Surface, CompressError>;

    /// Intrinsic size of a raster.
    fn dimensions(&self, surface: &Self::Surface) -> Dimensions;

    /// Draw the raster onto a fresh surface of the requested size.
    fn render(
        &self,
        surface: Self::Surface,
        params: &RenderParams,
    ) -> Result<Self::Surface, CompressError>;

    /// Encode the surface. May return an empty buffer; the caller rejects it.
    fn encode(
        &self,
        surface: &Self::Surface,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, CompressError>;
}
