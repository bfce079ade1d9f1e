//! End-to-end entry points: photo in, quilling template document out.
//!
//! All image work is CPU-bound and runs inside
//! [`tokio::task::spawn_blocking`], so calling these from an async server
//! never stalls the runtime's worker threads. Stages still run strictly in
//! order within a single call.

use crate::config::ProjectConfig;
use crate::error::QuillingError;
use crate::output::{ImageInfo, ProjectOutput, ProjectStats};
use crate::pipeline::document::DocumentRenderer;
use crate::pipeline::quantize::count_colors;
use crate::pipeline::{input, Pipeline, PipelineArtifacts, Stage};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Generate a quilling template from an image file.
///
/// This is the primary entry point for the library. The document is written
/// to a fresh `quilling_project_<random>.pdf` inside
/// [`ProjectConfig::output_dir`].
///
/// # Errors
/// - [`QuillingError::InvalidParameter`] / [`QuillingError::InvalidThresholds`]
///   for out-of-range settings (checked before the input is read)
/// - file-not-found, permission, format and decode errors for bad input
/// - [`QuillingError::OutputWriteFailed`] when the document cannot be written
///
/// # Example
/// ```rust,no_run
/// use quillgen::{generate, ProjectConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ProjectConfig::builder().colors(6).build()?;
/// let output = generate("photo.jpg", &config).await?;
/// println!("{}", output.document.path.display());
/// # Ok(())
/// # }
/// ```
pub async fn generate(
    input_path: impl AsRef<Path>,
    config: &ProjectConfig,
) -> Result<ProjectOutput, QuillingError> {
    let path = input_path.as_ref().to_path_buf();
    config.validate()?;
    info!("Starting generation: {}", path.display());

    start_pipeline(config);
    let (image, decode_ms) = decode_stage(config, move || input::load_image(&path)).await?;
    finish(image, decode_ms, config, None).await
}

/// Generate a quilling template from encoded PNG or JPEG bytes.
///
/// Use this when the photo arrives as an upload or from a database rather
/// than a file on disk.
pub async fn generate_from_bytes(
    bytes: &[u8],
    config: &ProjectConfig,
) -> Result<ProjectOutput, QuillingError> {
    config.validate()?;
    info!("Starting generation from {} bytes", bytes.len());

    start_pipeline(config);
    let owned = bytes.to_vec();
    let (image, decode_ms) = decode_stage(config, move || input::decode_image(&owned)).await?;
    finish(image, decode_ms, config, None).await
}

/// Generate a template and write the document to exactly `output_path`.
///
/// The write is atomic (temp file + rename), so a reader never sees a
/// partial document. Nothing is written to [`ProjectConfig::output_dir`].
/// The returned edge map is the one embedded in the document.
pub async fn generate_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ProjectConfig,
) -> Result<ProjectOutput, QuillingError> {
    let path = input_path.as_ref().to_path_buf();
    config.validate()?;
    info!("Starting generation: {}", path.display());

    start_pipeline(config);
    let (image, decode_ms) = decode_stage(config, move || input::load_image(&path)).await?;
    finish(
        image,
        decode_ms,
        config,
        Some(output_path.as_ref().to_path_buf()),
    )
    .await
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn generate_sync(
    input_path: impl AsRef<Path>,
    config: &ProjectConfig,
) -> Result<ProjectOutput, QuillingError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QuillingError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(input_path, config))
}

/// Run resize, quantize and edge detection on encoded bytes without writing
/// a document.
///
/// This is what an interactive front end calls while the user adjusts the
/// sliders; pair it with [`crate::pipeline::encode::preview_data_uri`].
pub async fn preview(
    bytes: &[u8],
    config: &ProjectConfig,
) -> Result<PipelineArtifacts, QuillingError> {
    config.validate()?;
    let owned = bytes.to_vec();
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let image = input::decode_image(&owned)?;
        Pipeline::from_config(&config)?.run(&image)
    })
    .await
    .map_err(|e| QuillingError::Internal(format!("Preview task panicked: {}", e)))?
}

/// Read an image's dimensions and format without decoding its pixels.
pub async fn inspect(input_path: impl AsRef<Path>) -> Result<ImageInfo, QuillingError> {
    let path = input_path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || input::inspect_image(&path))
        .await
        .map_err(|e| QuillingError::Internal(format!("Inspect task panicked: {}", e)))?
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn start_pipeline(config: &ProjectConfig) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_start(Stage::ALL.len());
    }
}

/// Run a decoder on the blocking pool, reporting it as [`Stage::Decode`].
async fn decode_stage<F>(config: &ProjectConfig, decode: F) -> Result<(RgbImage, u64), QuillingError>
where
    F: FnOnce() -> Result<RgbImage, QuillingError> + Send + 'static,
{
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Decode);
    }
    let start = Instant::now();
    let image = tokio::task::spawn_blocking(decode)
        .await
        .map_err(|e| QuillingError::Internal(format!("Decode task panicked: {}", e)))??;
    let decode_ms = start.elapsed().as_millis() as u64;
    debug!(
        "Decoded {}x{} image in {}ms",
        image.width(),
        image.height(),
        decode_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::Decode, decode_ms);
    }
    Ok((image, decode_ms))
}

/// Everything after decoding, on the blocking pool.
async fn finish(
    image: RgbImage,
    decode_ms: u64,
    config: &ProjectConfig,
    target: Option<PathBuf>,
) -> Result<ProjectOutput, QuillingError> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        generate_blocking(&image, decode_ms, &config, target.as_deref())
    })
    .await
    .map_err(|e| QuillingError::Internal(format!("Pipeline task panicked: {}", e)))?
}

fn generate_blocking(
    image: &RgbImage,
    decode_ms: u64,
    config: &ProjectConfig,
    target: Option<&Path>,
) -> Result<ProjectOutput, QuillingError> {
    let total_start = Instant::now();
    let pipeline = Pipeline::from_config(config)?;
    let artifacts = pipeline.run(image)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::RenderDocument);
    }
    let document_start = Instant::now();
    let renderer = DocumentRenderer::from_config(config);
    let document = match target {
        Some(path) => renderer.render_to(
            artifacts.edges.image(),
            &config.caption_top,
            &config.caption_bottom,
            path,
        )?,
        None => renderer.render(
            artifacts.edges.image(),
            &config.caption_top,
            &config.caption_bottom,
        )?,
    };
    let document_duration_ms = document_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::RenderDocument, document_duration_ms);
    }

    let stats = ProjectStats {
        source_width: image.width(),
        source_height: image.height(),
        width: artifacts.edges.width(),
        height: artifacts.edges.height(),
        colors_used: count_colors(&artifacts.quantized),
        edge_pixels: artifacts.edges.edge_pixel_count(),
        quantizer: pipeline.quantizer_name().to_string(),
        edge_detector: pipeline.detector_name().to_string(),
        decode_duration_ms: decode_ms,
        resize_duration_ms: artifacts.resize_duration_ms,
        quantize_duration_ms: artifacts.quantize_duration_ms,
        edges_duration_ms: artifacts.edges_duration_ms,
        document_duration_ms,
        total_duration_ms: decode_ms + total_start.elapsed().as_millis() as u64,
        document_bytes: document.bytes.len(),
    };

    info!(
        "Generation complete: {}x{}, {} colours, {} edge px, {}ms total",
        stats.width, stats.height, stats.colors_used, stats.edge_pixels, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_complete(&stats);
    }

    Ok(ProjectOutput {
        edges: artifacts.edges,
        document,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn checkerboard() -> RgbImage {
        RgbImage::from_fn(320, 240, |x, y| {
            if (x / 40 + y / 40) % 2 == 0 {
                Rgb([240, 240, 240])
            } else {
                Rgb([30, 60, 90])
            }
        })
    }

    #[test]
    fn sync_generation_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        checkerboard().save(&input).unwrap();
        let config = ProjectConfig::builder()
            .output_dir(dir.path().join("out"))
            .build()
            .unwrap();

        let output = generate_sync(&input, &config).unwrap();
        assert!(output.document.path.starts_with(dir.path().join("out")));
        assert_eq!(output.stats.source_width, 320);
        assert_eq!((output.stats.width, output.stats.height), (400, 300));
        assert!(output.stats.colors_used <= 8);
        assert_eq!(output.stats.quantizer, "kmeans");
        assert_eq!(output.stats.edge_detector, "canny");
        assert_eq!(output.stats.document_bytes, output.document.bytes.len());
    }

    #[test]
    fn exact_path_generation_returns_embedded_edges() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        checkerboard().save(&input).unwrap();
        let target = dir.path().join("template.pdf");
        let config = ProjectConfig::builder()
            .output_dir(dir.path().join("unused"))
            .build()
            .unwrap();

        let output = tokio_test::block_on(generate_to_file(&input, &target, &config)).unwrap();
        assert_eq!(output.document.path, target);
        assert_eq!((output.edges.width(), output.edges.height()), (400, 300));
        assert_eq!(output.stats.edge_pixels, output.edges.edge_pixel_count());
        assert_eq!(std::fs::read(&target).unwrap(), output.document.bytes);
        assert!(!dir.path().join("unused").exists());
    }

    #[test]
    fn preview_skips_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::builder()
            .output_dir(dir.path().join("never"))
            .target_width(160)
            .build()
            .unwrap();
        let artifacts = tokio_test::block_on(preview(&png_bytes(&checkerboard()), &config)).unwrap();
        assert_eq!(artifacts.resized.dimensions(), (160, 120));
        assert!(!dir.path().join("never").exists());
    }

    #[test]
    fn invalid_config_fails_before_reading_input() {
        let mut config = ProjectConfig::default();
        config.target_width = 50;
        let err = tokio_test::block_on(generate("/does/not/exist.png", &config)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn inspect_reports_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        checkerboard().save(&input).unwrap();
        let info = tokio_test::block_on(inspect(&input)).unwrap();
        assert_eq!((info.width, info.height), (320, 240));
        assert_eq!(info.format, "png");
    }
}
