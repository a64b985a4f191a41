//! Image validation and decoding.
//!
//! Generated images are checked here before they are stored, and stored images
//! are decoded here before compositing or judging.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};

use crate::error::PipelineError;

/// Allowed image formats for generated dish images.
pub const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Maximum file size for images (10MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Validate image data: check size and format, and detect content type.
///
/// Returns the content type on success (e.g., "image/jpeg").
pub fn validate_image(data: &[u8]) -> Result<String, PipelineError> {
    if data.len() > MAX_FILE_SIZE {
        return Err(PipelineError::validation(format!(
            "Image too large: {} bytes (max {})",
            data.len(),
            MAX_FILE_SIZE
        )));
    }

    let format = image::guess_format(data)
        .map_err(|e| PipelineError::validation(format!("Could not detect image format: {}", e)))?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(PipelineError::validation(format!(
            "Unsupported image format: {:?}. Allowed: JPEG, PNG, GIF, WebP",
            format
        )));
    }

    Ok(format.to_mime_type().to_string())
}

/// Decode image bytes in any allowed format.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, PipelineError> {
    validate_image(data)?;
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| PipelineError::validation(format!("Failed to read image: {}", e)))?
        .decode()
        .map_err(|e| PipelineError::validation(format!("Failed to decode image: {}", e)))
}

/// Encode an RGBA buffer as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| PipelineError::internal(format!("Failed to encode PNG: {}", e)))?;
    Ok(buf.into_inner())
}

/// Re-encode any allowed image as PNG, so stored artifacts share one format.
pub fn to_png(data: &[u8]) -> Result<Vec<u8>, PipelineError> {
    if image::guess_format(data).ok() == Some(ImageFormat::Png) {
        validate_image(data)?;
        return Ok(data.to_vec());
    }
    let decoded = decode_image(data)?;
    encode_png(&decoded.to_rgba8())
}
