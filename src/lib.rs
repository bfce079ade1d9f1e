//! # quillgen
//!
//! Turn a photo into a printable paper-quilling template.
//!
//! Quilling builds pictures from coiled paper strips laid along outlines.
//! A raw photo has far too many edges to follow, so this crate first
//! flattens it to a handful of colour regions and only then extracts the
//! boundaries between them. The result is a one-page PDF with the outline
//! image and two captions, ready to print.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo (PNG / JPEG)
//!  │
//!  ├─ 1. Decode    sniff magic bytes, decode to RGB8
//!  ├─ 2. Resize    normalise to 100–800 px wide, aspect ratio kept
//!  ├─ 3. Quantize  k-means or median cut down to 2–20 colours
//!  ├─ 4. Edges     blur + Canny (white on black) or Laplacian (dark on white)
//!  └─ 5. Document  one A4 page: caption, 400×300 pt image, caption
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quillgen::{generate, ProjectConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProjectConfig::builder()
//!         .target_width(400)
//!         .colors(8)
//!         .build()?;
//!     let output = generate("photo.jpg", &config).await?;
//!     println!("template written to {}", output.document.path.display());
//!     eprintln!("{} colours, {} edge pixels",
//!         output.stats.colors_used,
//!         output.stats.edge_pixels);
//!     Ok(())
//! }
//! ```
//!
//! The individual stages are available as plain functions for callers that
//! want to drive them one by one:
//!
//! ```rust
//! use image::{Rgb, RgbImage};
//! use quillgen::{detect_edges, quantize, resize};
//!
//! let photo = RgbImage::from_pixel(1000, 600, Rgb([0, 0, 255]));
//! let resized = resize(&photo, 400).unwrap();
//! let flat = quantize(&resized, 8).unwrap();
//! let edges = detect_edges(&flat).unwrap();
//! assert_eq!((edges.width(), edges.height()), (400, 240));
//! assert_eq!(edges.edge_pixel_count(), 0);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `quillgen` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! quillgen = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EdgeDetectorKind, ProjectConfig, ProjectConfigBuilder, QuantizerKind};
pub use convert::{generate, generate_from_bytes, generate_sync, generate_to_file, inspect, preview};
pub use error::{ErrorKind, QuillingError};
pub use output::{ImageInfo, ProjectOutput, ProjectStats};
pub use pipeline::document::{build_document, DocumentRenderer, RenderedDocument};
pub use pipeline::edges::{CannyDetector, EdgeDetector, EdgeMap, EdgePolarity, LaplacianDetector};
pub use pipeline::quantize::{KMeansQuantizer, MedianCutQuantizer, Quantizer};
pub use pipeline::{detect_edges, quantize, render_document, resize, Pipeline, PipelineArtifacts, Stage};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
