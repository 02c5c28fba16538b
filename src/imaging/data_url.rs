//! Base64 `data:` URLs for blobs.
//!
//! Format: `data:<mime>;base64,<standard base64 with padding>`.

use super::backend::{Blob, CompressError};
use base64::{Engine as _, engine::general_purpose};
use image::ImageFormat;
use std::io::Read;

const BASE64_MARKER: &str = ";base64,";

/// Encode a blob as a data URL carrying its media type.
pub fn blob_to_base64(blob: &Blob<'_>) -> String {
    to_data_url(blob.bytes(), blob.mime_type())
}

/// Read a stream to the end, then encode it as a data URL.
pub fn read_to_base64(mut reader: impl Read, format: ImageFormat) -> Result<String, CompressError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(to_data_url(&bytes, format.to_mime_type()))
}

fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!(
        "data:{mime}{BASE64_MARKER}{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Parse a base64 data URL back into a blob.
pub fn parse_data_url(url: &str) -> Result<Blob<'static>, CompressError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| CompressError::Decode("not a data URL".into()))?;
    let marker = rest
        .find(BASE64_MARKER)
        .ok_or_else(|| CompressError::Decode("data URL is not base64-encoded".into()))?;

    let mime = &rest[..marker];
    let format = ImageFormat::from_mime_type(mime)
        .ok_or_else(|| CompressError::UnsupportedFormat(mime.to_string()))?;
    let bytes = general_purpose::STANDARD
        .decode(&rest[marker + BASE64_MARKER.len()..])
        .map_err(|e| CompressError::Decode(format!("invalid base64 payload: {e}")))?;

    Ok(Blob::owned(bytes, format))
}
