//! Input resolution: turn a user-supplied path or byte stream into an RGB image.
//!
//! Only PNG and JPEG are accepted. The magic bytes are checked before the
//! decoder runs so a mislabelled upload (a GIF renamed to `.png`, an HTML
//! error page saved as `.jpg`) is reported as an unsupported format rather
//! than as an opaque decoder failure. Everything is converted to 8-bit RGB
//! here; alpha is dropped, matching what the later stages expect.

use crate::error::QuillingError;
use crate::output::ImageInfo;
use image::{ImageFormat, RgbImage};
use std::io::Read;
use std::path::Path;
use tracing::debug;

const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Identify the encoding from the leading bytes.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&PNG_MAGIC) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(&JPEG_MAGIC) {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

fn leading_magic(bytes: &[u8]) -> [u8; 4] {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    magic
}

/// Read a PNG or JPEG file from disk and decode it to RGB.
pub fn load_image(path: &Path) -> Result<RgbImage, QuillingError> {
    let bytes = read_input(path)?;
    match sniff_format(&bytes) {
        Some(format) => decode_with_format(&bytes, format),
        None if bytes.is_empty() => Err(QuillingError::EmptyImage),
        None => Err(QuillingError::UnsupportedFormat {
            path: path.to_path_buf(),
            magic: leading_magic(&bytes),
        }),
    }
}

/// Decode an uploaded byte stream (PNG or JPEG) to RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, QuillingError> {
    if bytes.is_empty() {
        return Err(QuillingError::EmptyImage);
    }
    let format = sniff_format(bytes).ok_or_else(|| QuillingError::UnsupportedFormat {
        path: "<bytes>".into(),
        magic: leading_magic(bytes),
    })?;
    decode_with_format(bytes, format)
}

/// Report dimensions and format of an image file without decoding pixels.
pub fn inspect_image(path: &Path) -> Result<ImageInfo, QuillingError> {
    let bytes = read_input(path)?;
    let format = sniff_format(&bytes).ok_or_else(|| QuillingError::UnsupportedFormat {
        path: path.to_path_buf(),
        magic: leading_magic(&bytes),
    })?;

    let reader = image::ImageReader::with_format(std::io::Cursor::new(&bytes), format);
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| QuillingError::Decode {
            detail: e.to_string(),
        })?;

    Ok(ImageInfo {
        width,
        height,
        format: format_name(format).to_string(),
        file_size: bytes.len() as u64,
    })
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        _ => "unknown",
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, QuillingError> {
    if !path.exists() {
        return Err(QuillingError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(QuillingError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(QuillingError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| QuillingError::Decode {
            detail: format!("reading '{}': {}", path.display(), e),
        })?;

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

fn decode_with_format(bytes: &[u8], format: ImageFormat) -> Result<RgbImage, QuillingError> {
    let decoded =
        image::load_from_memory_with_format(bytes, format).map_err(|e| QuillingError::Decode {
            detail: e.to_string(),
        })?;

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(QuillingError::EmptyImage);
    }

    debug!(
        "Decoded {} image → {}x{} px",
        format_name(format),
        decoded.width(),
        decoded.height()
    );
    Ok(decoded.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{DynamicImage, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn sniff_known_formats() {
        assert_eq!(sniff_format(b"\x89PNG\r\n\x1a\n"), Some(ImageFormat::Png));
        assert_eq!(sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(sniff_format(b"GIF89a"), None);
        assert_eq!(sniff_format(b""), None);
    }

    #[test]
    fn decode_png_drops_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 0])));
        let rgb = decode_image(&encode(img, ImageFormat::Png)).expect("decode");
        assert_eq!(rgb.dimensions(), (4, 3));
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([10, 20, 30]));
    }

    #[test]
    fn decode_jpeg() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, Rgb([0, 0, 255])));
        let rgb = decode_image(&encode(img, ImageFormat::Jpeg)).expect("decode");
        assert_eq!(rgb.dimensions(), (16, 8));
    }

    #[test]
    fn empty_and_garbage_bytes_are_invalid_input() {
        let err = decode_image(&[]).unwrap_err();
        assert!(matches!(err, QuillingError::EmptyImage));

        let err = decode_image(b"GIF89a....").unwrap_err();
        assert!(matches!(err, QuillingError::UnsupportedFormat { magic, .. } if &magic == b"GIF8"));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        // Right magic, truncated body.
        let err = decode_image(b"\x89PNG\r\n\x1a\n").unwrap_err();
        assert!(matches!(err, QuillingError::Decode { .. }));
    }

    #[test]
    fn load_missing_file() {
        let err = load_image(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, QuillingError::FileNotFound { .. }));
    }

    #[test]
    fn load_and_inspect_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        RgbImage::from_pixel(30, 20, Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let rgb = load_image(&path).expect("load");
        assert_eq!(rgb.dimensions(), (30, 20));

        let info = inspect_image(&path).expect("inspect");
        assert_eq!(info.width, 30);
        assert_eq!(info.height, 20);
        assert_eq!(info.format, "png");
        assert!(info.file_size > 0);
    }

    #[test]
    fn load_rejects_wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"<html>not an image</html>").unwrap();
        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, QuillingError::UnsupportedFormat { .. }));
    }
}
