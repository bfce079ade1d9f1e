//! Error types for the quillgen library.
//!
//! Every failure is fatal for the current invocation: the pipeline is
//! deterministic and in-memory except for the final write, so nothing is
//! retried. Variants carry enough context for the caller (usually a UI or
//! the CLI) to show a useful message and let the user try again.
//!
//! Variants are grouped into three coarse kinds, exposed through
//! [`QuillingError::kind`]:
//!
//! * [`ErrorKind::InvalidParameter`]: width, colour count or detector
//!   settings outside their accepted range.
//! * [`ErrorKind::InvalidInput`]: the image is missing, unreadable,
//!   corrupt or empty.
//! * [`ErrorKind::Io`]: the output document could not be produced or
//!   written.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the quillgen library.
#[derive(Debug, Error)]
pub enum QuillingError {
    // ── Parameter errors ──────────────────────────────────────────────────
    /// A numeric parameter is outside its accepted range.
    #[error("Invalid {name}: {value} (expected {min}–{max})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        min: String,
        max: String,
    },

    /// Canny hysteresis thresholds must satisfy `0 < low ≤ high`.
    #[error("Invalid edge thresholds: low={low}, high={high} (expected 0 < low ≤ high)")]
    InvalidThresholds { low: f32, high: f32 },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but is neither PNG nor JPEG.
    #[error("Unsupported image format: '{path}' (expected PNG or JPEG)\nFirst bytes: {magic:?}")]
    UnsupportedFormat { path: PathBuf, magic: [u8; 4] },

    /// The bytes looked like an image but could not be decoded.
    #[error("Failed to decode image: {detail}")]
    Decode { detail: String },

    /// The image has no pixels (or the byte stream was empty).
    #[error("Image is empty: nothing to process")]
    EmptyImage,

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output document or intermediate file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document could not be serialised.
    #[error("Failed to encode document: {detail}")]
    DocumentEncoding { detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`QuillingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    InvalidParameter,
    InvalidInput,
    Io,
}

impl QuillingError {
    /// Build an [`QuillingError::InvalidParameter`] for an integer-like value.
    pub(crate) fn out_of_range<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        min: T,
        max: T,
    ) -> Self {
        QuillingError::InvalidParameter {
            name,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Which of the three error kinds this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuillingError::InvalidParameter { .. } | QuillingError::InvalidThresholds { .. } => {
                ErrorKind::InvalidParameter
            }
            QuillingError::FileNotFound { .. }
            | QuillingError::PermissionDenied { .. }
            | QuillingError::UnsupportedFormat { .. }
            | QuillingError::Decode { .. }
            | QuillingError::EmptyImage => ErrorKind::InvalidInput,
            QuillingError::OutputWriteFailed { .. }
            | QuillingError::DocumentEncoding { .. }
            | QuillingError::Internal(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameter_display() {
        let e = QuillingError::out_of_range("target width", 801, 100, 800);
        let msg = e.to_string();
        assert!(msg.contains("target width"), "got: {msg}");
        assert!(msg.contains("801"), "got: {msg}");
        assert!(msg.contains("100–800"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn thresholds_are_parameter_errors() {
        let e = QuillingError::InvalidThresholds {
            low: 200.0,
            high: 100.0,
        };
        assert!(e.to_string().contains("low=200"));
        assert_eq!(e.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn input_errors_classified() {
        assert_eq!(QuillingError::EmptyImage.kind(), ErrorKind::InvalidInput);
        let e = QuillingError::UnsupportedFormat {
            path: PathBuf::from("a.gif"),
            magic: *b"GIF8",
        };
        assert_eq!(e.kind(), ErrorKind::InvalidInput);
        assert!(e.to_string().contains("a.gif"));
    }

    #[test]
    fn write_failure_is_io() {
        let e = QuillingError::OutputWriteFailed {
            path: PathBuf::from("/nope/out.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(e.kind(), ErrorKind::Io);
        assert!(e.to_string().contains("/nope/out.pdf"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
