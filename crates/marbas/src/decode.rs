//! Base64 image decoding.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat};
use vassago_core::{Error, Result};

/// Decodes a base64 image, with or without a `data:image/...;base64,` prefix.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the payload is not valid base64 or not a
/// recognizable image.
pub fn decode_base64(payload: &str) -> Result<DynamicImage> {
    let data = strip_data_uri(payload.trim());
    if data.is_empty() {
        return Err(Error::decode("empty image payload"));
    }

    // Some clients wrap base64 at 76 columns.
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::decode(format!("invalid base64: {e}")))?;

    decode_bytes(&bytes)
}

/// Decodes raw image bytes in any supported format.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the bytes are not a recognizable image.
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::decode(format!("invalid image: {e}")))
}

fn strip_data_uri(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some((_, data)) = payload.split_once(";base64,") {
            return data;
        }
    }
    payload
}

/// Encodes an image as a PNG `data:` URI.
///
/// # Errors
///
/// Returns [`Error::Vision`] if the image cannot be encoded.
pub fn encode_png_data_uri(image: &DynamicImage) -> Result<String> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::vision(format!("failed to encode image: {e}")))?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
}
