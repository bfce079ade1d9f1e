//! Pipeline stages for photo-to-template generation.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and strategies can be swapped without touching the
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ resize ──▶ quantize ──▶ edges ──▶ document
//! (decode)  (width)    (k colours)  (outline)  (one-page PDF)
//! ```
//!
//! 1. [`input`]: read and sniff the file, decode to RGB8
//! 2. [`resize`]: normalise to the target width, keeping aspect ratio
//! 3. [`quantize`]: reduce to at most k representative colours
//! 4. [`edges`]: blur + edge extraction into a single-channel map
//! 5. [`document`]: embed the edge map and captions in a PDF page
//!
//! [`encode`] is a side path that turns the edge map into a PNG / data URI
//! for on-screen previews.
//!
//! Stages run strictly in order; each consumes the previous stage's output.

pub mod document;
pub mod edges;
pub mod encode;
pub mod input;
pub mod quantize;
pub mod resize;

pub use document::{render_document, RenderedDocument};
pub use edges::{detect_edges, EdgeDetector, EdgeMap};
pub use quantize::{quantize, Quantizer};
pub use resize::resize;

use crate::config::{EdgeDetectorKind, ProjectConfig, QuantizerKind};
use crate::error::QuillingError;
use crate::progress::ProgressCallback;
use edges::{CannyDetector, LaplacianDetector};
use image::RgbImage;
use quantize::{KMeansQuantizer, MedianCutQuantizer};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::debug;

/// One step of the end-to-end run, as reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decode,
    Resize,
    Quantize,
    DetectEdges,
    RenderDocument,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Decode,
        Stage::Resize,
        Stage::Quantize,
        Stage::DetectEdges,
        Stage::RenderDocument,
    ];

    /// Zero-based position in [`Stage::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Decode => "decode",
            Stage::Resize => "resize",
            Stage::Quantize => "quantize",
            Stage::DetectEdges => "detect edges",
            Stage::RenderDocument => "render document",
        };
        f.write_str(label)
    }
}

/// Intermediate images from [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct PipelineArtifacts {
    /// Input resized to the target width.
    pub resized: RgbImage,
    /// Resized image reduced to at most k colours.
    pub quantized: RgbImage,
    /// Edge map of the quantized image; same dimensions as `resized`.
    pub edges: EdgeMap,
    pub resize_duration_ms: u64,
    pub quantize_duration_ms: u64,
    pub edges_duration_ms: u64,
}

/// The image half of the run: resize → quantize → detect edges.
///
/// Holds the strategies selected by [`ProjectConfig`] so they are built once
/// and reused across images.
pub struct Pipeline {
    quantizer: Box<dyn Quantizer>,
    detector: Box<dyn EdgeDetector>,
    target_width: u32,
    colors: u32,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("quantizer", &self.quantizer.name())
            .field("detector", &self.detector.name())
            .field("target_width", &self.target_width)
            .field("colors", &self.colors)
            .finish()
    }
}

impl Pipeline {
    /// Validate `config` and build the strategies it selects.
    pub fn from_config(config: &ProjectConfig) -> Result<Self, QuillingError> {
        config.validate()?;

        let quantizer: Box<dyn Quantizer> = match config.quantizer {
            QuantizerKind::KMeans => Box::new(KMeansQuantizer::from_config(config)),
            QuantizerKind::MedianCut => Box::new(MedianCutQuantizer),
        };
        let detector: Box<dyn EdgeDetector> = match config.edge_detector {
            EdgeDetectorKind::Canny => Box::new(CannyDetector::from_config(config)),
            EdgeDetectorKind::Laplacian => Box::new(LaplacianDetector::from_config(config)),
        };

        Ok(Self {
            quantizer,
            detector,
            target_width: config.target_width,
            colors: config.colors,
            progress: config.progress_callback.clone(),
        })
    }

    /// Assemble a pipeline from explicit strategies.
    pub fn with_strategies(
        quantizer: Box<dyn Quantizer>,
        detector: Box<dyn EdgeDetector>,
        target_width: u32,
        colors: u32,
    ) -> Self {
        Self {
            quantizer,
            detector,
            target_width,
            colors,
            progress: None,
        }
    }

    pub fn quantizer_name(&self) -> &'static str {
        self.quantizer.name()
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    fn stage<T>(
        &self,
        stage: Stage,
        f: impl FnOnce() -> Result<T, QuillingError>,
    ) -> Result<(T, u64), QuillingError> {
        if let Some(ref cb) = self.progress {
            cb.on_stage_start(stage);
        }
        let start = Instant::now();
        let value = f()?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        if let Some(ref cb) = self.progress {
            cb.on_stage_complete(stage, elapsed_ms);
        }
        Ok((value, elapsed_ms))
    }

    /// Run resize, quantize and edge detection on `image`.
    pub fn run(&self, image: &RgbImage) -> Result<PipelineArtifacts, QuillingError> {
        let (resized, resize_duration_ms) =
            self.stage(Stage::Resize, || resize(image, self.target_width))?;

        let (quantized, quantize_duration_ms) = self.stage(Stage::Quantize, || {
            self.quantizer.quantize(&resized, self.colors)
        })?;

        let (edges, edges_duration_ms) =
            self.stage(Stage::DetectEdges, || self.detector.detect(&quantized))?;

        debug!(
            "Pipeline {}+{}: {}x{} → {} edge px ({}ms / {}ms / {}ms)",
            self.quantizer.name(),
            self.detector.name(),
            edges.width(),
            edges.height(),
            edges.edge_pixel_count(),
            resize_duration_ms,
            quantize_duration_ms,
            edges_duration_ms
        );

        Ok(PipelineArtifacts {
            resized,
            quantized,
            edges,
            resize_duration_ms,
            quantize_duration_ms,
            edges_duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::PipelineProgressCallback;
    use image::Rgb;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(Stage, bool)>>,
    }

    impl PipelineProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push((stage, false));
        }
        fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
            self.events.lock().unwrap().push((stage, true));
        }
    }

    /// Yellow left half, navy right half: luma 193 against 36.
    fn two_tone(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgb([230, 200, 60])
            } else {
                Rgb([20, 20, 160])
            }
        })
    }

    #[test]
    fn stage_order_and_labels() {
        assert_eq!(Stage::ALL.len(), 5);
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
        assert_eq!(Stage::DetectEdges.to_string(), "detect edges");
        assert_eq!(
            serde_json::to_string(&Stage::RenderDocument).unwrap(),
            "\"render_document\""
        );
    }

    #[test]
    fn run_produces_consistent_artifacts() {
        let pipeline = Pipeline::from_config(&ProjectConfig::default()).unwrap();
        let out = pipeline.run(&two_tone(800, 400)).unwrap();
        assert_eq!(out.resized.dimensions(), (400, 200));
        assert_eq!(out.quantized.dimensions(), (400, 200));
        assert_eq!((out.edges.width(), out.edges.height()), (400, 200));
        assert!(out.edges.edge_pixel_count() > 0);
        // The boundary sits at x = 200 after halving.
        let column: Vec<u32> = (190..210)
            .filter(|&x| out.edges.is_edge(out.edges.image().get_pixel(x, 100)[0]))
            .collect();
        assert!(!column.is_empty());
    }

    #[test]
    fn both_detectors_find_the_boundary() {
        for kind in [EdgeDetectorKind::Canny, EdgeDetectorKind::Laplacian] {
            let config = ProjectConfig::builder().edge_detector(kind).build().unwrap();
            let out = Pipeline::from_config(&config)
                .unwrap()
                .run(&two_tone(400, 200))
                .unwrap();
            assert!(out.edges.edge_pixel_count() > 0, "{kind:?}");
        }
    }

    #[test]
    fn strategies_follow_config() {
        let config = ProjectConfig::builder()
            .quantizer(QuantizerKind::MedianCut)
            .edge_detector(EdgeDetectorKind::Laplacian)
            .build()
            .unwrap();
        let pipeline = Pipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.quantizer_name(), "median-cut");
        assert_eq!(pipeline.detector_name(), "laplacian");
        let out = pipeline.run(&two_tone(200, 100)).unwrap();
        assert_eq!(out.edges.polarity(), edges::EdgePolarity::DarkOnLight);
    }

    #[test]
    fn explicit_strategies() {
        let pipeline = Pipeline::with_strategies(
            Box::new(MedianCutQuantizer),
            Box::new(CannyDetector::default()),
            100,
            2,
        );
        let out = pipeline.run(&two_tone(300, 150)).unwrap();
        assert_eq!(out.quantized.dimensions(), (100, 50));
        assert!(quantize::count_colors(&out.quantized) <= 2);
        assert_eq!(out.edges.polarity(), edges::EdgePolarity::BrightOnDark);
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = ProjectConfig::default();
        config.colors = 1;
        assert!(Pipeline::from_config(&config).is_err());
    }

    #[test]
    fn progress_events_in_order() {
        let recorder = Arc::new(Recorder::default());
        let config = ProjectConfig::builder()
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        Pipeline::from_config(&config)
            .unwrap()
            .run(&two_tone(300, 300))
            .unwrap();
        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                (Stage::Resize, false),
                (Stage::Resize, true),
                (Stage::Quantize, false),
                (Stage::Quantize, true),
                (Stage::DetectEdges, false),
                (Stage::DetectEdges, true),
            ]
        );
    }
}
