//! Image payload decoding.
//!
//! Enrollment and recognition payloads arrive either as raw encoded image
//! bytes or as the `data:image/...;base64,` strings a browser canvas
//! produces. Both forms decode to a 3-channel RGB raster.

use base64::Engine;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("data URI payload has no base64 separator")]
    MalformedDataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported or malformed image: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode an encoded image payload into an RGB raster.
///
/// Accepted forms, tried in order:
/// 1. a data URI (`data:*;base64,<payload>`) — the prefix up to the first
///    `,` is stripped and the remainder base64-decoded,
/// 2. raw encoded image bytes (PNG, JPEG, ...),
/// 3. bare base64 text of encoded image bytes.
///
/// Grayscale and alpha-bearing sources are converted, so the output is
/// always 3-channel.
pub fn decode_payload(payload: &[u8]) -> Result<RgbImage, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    if payload.starts_with(b"data:") {
        let comma = payload
            .iter()
            .position(|&b| b == b',')
            .ok_or(DecodeError::MalformedDataUri)?;
        let bytes = decode_base64(&payload[comma + 1..])?;
        return decode_bytes(&bytes);
    }

    match decode_bytes(payload) {
        Ok(img) => Ok(img),
        Err(raw_err) => {
            // Not directly decodable — may be bare base64 text.
            match decode_base64(payload) {
                Ok(bytes) => decode_bytes(&bytes),
                // Report the image error, not the base64 one: payloads
                // are usually raw bytes, and that error names the container.
                Err(_) => Err(raw_err),
            }
        }
    }
}

/// Decode already-unwrapped image bytes into RGB.
pub fn decode_bytes(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

fn decode_base64(text: &[u8]) -> Result<Vec<u8>, DecodeError> {
    // Browsers wrap or pad base64 payloads; strip ASCII whitespace first.
    let cleaned: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(&cleaned)?)
}
