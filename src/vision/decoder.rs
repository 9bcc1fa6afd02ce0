use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;

use super::error::DecodeError;

/// Decode an encoded image payload into an RGB raster.
///
/// The container format is sniffed from the bytes; clients send JPEG, but any
/// enabled `image` codec is accepted. The raster is always RGB, which is the
/// channel order the landmark detector expects.
pub fn decode_frame(payload: &[u8]) -> Result<RgbImage, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    let image =
        image::load_from_memory(payload).map_err(|e| DecodeError::Image(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::ZeroDimensions);
    }

    Ok(image.to_rgb8())
}

/// Decode the `jpeg_b64` wire field into raw image bytes.
///
/// Browsers hand out `data:image/jpeg;base64,...` URLs; the prefix is optional.
pub fn decode_base64_payload(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = encoded.trim();
    let body = match trimmed.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };

    if body.is_empty() {
        return Err(DecodeError::Empty);
    }

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DecodeError::Base64(e.to_string()))
}

pub fn decode_base64_frame(encoded: &str) -> Result<RgbImage, DecodeError> {
    let bytes = decode_base64_payload(encoded)?;
    decode_frame(&bytes)
}
