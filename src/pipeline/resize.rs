//! Resizing: normalise the photo to the requested width, keeping aspect ratio.

use crate::config::validate_target_width;
use crate::error::QuillingError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

/// Height that keeps `width × height` proportional at `target_width`.
///
/// Rounded to the nearest pixel and never below one.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let ratio = f64::from(target_width) / f64::from(width);
    ((f64::from(height) * ratio).round() as u32).max(1)
}

/// Resample `image` to `target_width` pixels wide.
///
/// Uses a triangle (bilinear) filter, which averages neighbouring pixels
/// when shrinking. The output is always RGB.
pub fn resize(image: &RgbImage, target_width: u32) -> Result<RgbImage, QuillingError> {
    validate_target_width(target_width)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(QuillingError::EmptyImage);
    }

    let target_height = scaled_height(width, height, target_width);
    let resized = imageops::resize(image, target_width, target_height, FilterType::Triangle);
    debug!(
        "Resized {}x{} → {}x{}",
        width, height, target_width, target_height
    );
    Ok(resized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn keeps_aspect_ratio() {
        let img = RgbImage::from_pixel(1000, 600, Rgb([0, 0, 255]));
        let out = resize(&img, 400).unwrap();
        assert_eq!(out.dimensions(), (400, 240));
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 255])));
    }

    #[test]
    fn upscales_small_images() {
        let img = RgbImage::from_pixel(50, 30, Rgb([9, 9, 9]));
        let out = resize(&img, 100).unwrap();
        assert_eq!(out.dimensions(), (100, 60));
    }

    #[test]
    fn ratio_within_one_pixel() {
        for (w, h) in [(1234, 567), (333, 1000), (801, 1), (7, 3)] {
            let img = RgbImage::new(w, h);
            for target in [100, 257, 800] {
                let out = resize(&img, target).unwrap();
                assert_eq!(out.width(), target);
                let exact = f64::from(h) * f64::from(target) / f64::from(w);
                assert!(
                    (f64::from(out.height()) - exact).abs() <= 1.0,
                    "{w}x{h} @ {target} → {}",
                    out.height()
                );
            }
        }
    }

    #[test]
    fn width_bounds() {
        let img = RgbImage::new(10, 10);
        assert!(resize(&img, 100).is_ok());
        assert!(resize(&img, 800).is_ok());
        for bad in [0, 99, 801] {
            let err = resize(&img, bad).unwrap_err();
            assert!(matches!(err, QuillingError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn empty_image_rejected() {
        let err = resize(&RgbImage::new(0, 0), 400).unwrap_err();
        assert!(matches!(err, QuillingError::EmptyImage));
    }

    #[test]
    fn very_wide_image_keeps_one_row() {
        assert_eq!(scaled_height(10_000, 1, 100), 1);
    }
}
