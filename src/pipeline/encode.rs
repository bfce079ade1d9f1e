//! Image encoding: edge map → PNG bytes, or a base64 data URI for previews.
//!
//! A web front end can drop the data URI straight into an `<img src=…>`
//! without a second round-trip. PNG keeps the one-pixel Canny lines crisp;
//! JPEG ringing would smear them.

use crate::error::QuillingError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage};
use std::io::Cursor;
use tracing::debug;

/// Encode a grayscale image as PNG.
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, QuillingError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| QuillingError::Internal(format!("PNG encoding failed: {e}")))?;
    debug!("Encoded {}x{} preview → {} bytes", image.width(), image.height(), buf.len());
    Ok(buf)
}

/// Encode a grayscale image as a `data:image/png;base64,…` URI.
pub fn preview_data_uri(image: &GrayImage) -> Result<String, QuillingError> {
    let png = encode_png(image)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
}
