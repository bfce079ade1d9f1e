//! Configuration types for quilling-template generation.
//!
//! All pipeline behaviour is controlled through [`ProjectConfig`], built via
//! its [`ProjectConfigBuilder`]. Keeping every knob in one struct makes it
//! easy to share a config between the preview path and the document path so
//! both produce the same edge map.
//!
//! Unlike a clamp-on-set builder, out-of-range width and colour counts are
//! rejected by [`ProjectConfigBuilder::build`] with
//! [`QuillingError::InvalidParameter`]: the UI already clamps its sliders,
//! so a bad value reaching the library is a caller bug worth surfacing.

use crate::error::QuillingError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Smallest accepted target width in pixels.
pub const MIN_TARGET_WIDTH: u32 = 100;
/// Largest accepted target width in pixels.
pub const MAX_TARGET_WIDTH: u32 = 800;
/// Smallest accepted palette size.
pub const MIN_COLORS: u32 = 2;
/// Largest accepted palette size.
pub const MAX_COLORS: u32 = 20;
/// Accepted Gaussian blur sigma range (pixels).
pub const BLUR_SIGMA_RANGE: (f32, f32) = (1.0, 3.0);

/// Default caption written above the edge image.
pub const DEFAULT_CAPTION_TOP: &str = "Generated Quilling Project";
/// Default caption written below the edge image.
pub const DEFAULT_CAPTION_BOTTOM: &str = "Guide lines for paper strips";

/// Configuration for one template-generation run.
///
/// Built via [`ProjectConfig::builder()`] or using
/// [`ProjectConfig::default()`].
///
/// # Example
/// ```rust
/// use quillgen::{EdgeDetectorKind, ProjectConfig, QuantizerKind};
///
/// let config = ProjectConfig::builder()
///     .target_width(600)
///     .colors(12)
///     .quantizer(QuantizerKind::MedianCut)
///     .edge_detector(EdgeDetectorKind::Laplacian)
///     .build()
///     .unwrap();
/// assert_eq!(config.target_width, 600);
/// ```
#[derive(Clone)]
pub struct ProjectConfig {
    /// Width the photo is resized to before any processing. Range: 100–800. Default: 400.
    ///
    /// Height follows from the source aspect ratio. Larger widths keep finer
    /// detail in the outline at the cost of a busier template.
    pub target_width: u32,

    /// Number of representative colours kept by the quantizer (k). Range: 2–20. Default: 8.
    ///
    /// Fewer colours merge neighbouring regions and give fewer, bolder
    /// outlines, which is usually what a quilling template wants.
    pub colors: u32,

    /// Colour-reduction strategy. Default: [`QuantizerKind::KMeans`].
    pub quantizer: QuantizerKind,

    /// Edge-extraction strategy. Default: [`EdgeDetectorKind::Canny`].
    pub edge_detector: EdgeDetectorKind,

    /// Gaussian blur sigma applied before edge extraction. Range: 1.0–3.0.
    ///
    /// `None` uses the detector's own default (see
    /// [`EdgeDetectorKind::default_blur_sigma`]).
    pub blur_sigma: Option<f32>,

    /// Canny low hysteresis threshold on the gradient magnitude. Default: 50.
    pub low_threshold: f32,

    /// Canny high hysteresis threshold on the gradient magnitude. Default: 150.
    pub high_threshold: f32,

    /// Number of independent k-means runs; the most compact wins. Default: 10.
    pub kmeans_attempts: u32,

    /// Iteration cap for a single k-means run. Default: 10.
    pub kmeans_max_iterations: u32,

    /// A k-means run stops once no centroid moves further than this. Default: 1.0.
    pub kmeans_epsilon: f32,

    /// Seed for k-means initialisation. Fixed by default so repeated runs
    /// produce byte-identical output.
    pub seed: u64,

    /// Text written above the edge image.
    pub caption_top: String,

    /// Text written below the edge image.
    pub caption_bottom: String,

    /// Directory documents are written to. Created if missing. Default: `output`.
    pub output_dir: PathBuf,

    /// Also keep the rasterised edge map as a PNG next to the document. Default: false.
    pub keep_intermediate: bool,

    /// Optional per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

/// Default k-means seed.
pub const DEFAULT_SEED: u64 = 0x5157_494c_4c49_4e47;

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            target_width: 400,
            colors: 8,
            quantizer: QuantizerKind::default(),
            edge_detector: EdgeDetectorKind::default(),
            blur_sigma: None,
            low_threshold: 50.0,
            high_threshold: 150.0,
            kmeans_attempts: 10,
            kmeans_max_iterations: 10,
            kmeans_epsilon: 1.0,
            seed: DEFAULT_SEED,
            caption_top: DEFAULT_CAPTION_TOP.to_string(),
            caption_bottom: DEFAULT_CAPTION_BOTTOM.to_string(),
            output_dir: PathBuf::from("output"),
            keep_intermediate: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectConfig")
            .field("target_width", &self.target_width)
            .field("colors", &self.colors)
            .field("quantizer", &self.quantizer)
            .field("edge_detector", &self.edge_detector)
            .field("blur_sigma", &self.blur_sigma)
            .field("low_threshold", &self.low_threshold)
            .field("high_threshold", &self.high_threshold)
            .field("kmeans_attempts", &self.kmeans_attempts)
            .field("kmeans_max_iterations", &self.kmeans_max_iterations)
            .field("seed", &self.seed)
            .field("output_dir", &self.output_dir)
            .field("keep_intermediate", &self.keep_intermediate)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl ProjectConfig {
    /// Create a new builder for `ProjectConfig`.
    pub fn builder() -> ProjectConfigBuilder {
        ProjectConfigBuilder {
            config: Self::default(),
        }
    }

    /// Blur sigma actually used: the explicit override or the detector default.
    pub fn effective_blur_sigma(&self) -> f32 {
        self.blur_sigma
            .unwrap_or_else(|| self.edge_detector.default_blur_sigma())
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<(), QuillingError> {
        validate_target_width(self.target_width)?;
        validate_colors(self.colors)?;
        if let Some(sigma) = self.blur_sigma {
            validate_blur_sigma(sigma)?;
        }
        validate_thresholds(self.low_threshold, self.high_threshold)?;
        if self.kmeans_attempts == 0 {
            return Err(QuillingError::out_of_range(
                "k-means attempts",
                0,
                1,
                u32::MAX,
            ));
        }
        if self.kmeans_max_iterations == 0 {
            return Err(QuillingError::out_of_range(
                "k-means iterations",
                0,
                1,
                u32::MAX,
            ));
        }
        if self.kmeans_epsilon.is_nan() || self.kmeans_epsilon < 0.0 {
            return Err(QuillingError::out_of_range(
                "k-means epsilon",
                self.kmeans_epsilon,
                0.0,
                f32::MAX,
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_target_width(width: u32) -> Result<(), QuillingError> {
    if !(MIN_TARGET_WIDTH..=MAX_TARGET_WIDTH).contains(&width) {
        return Err(QuillingError::out_of_range(
            "target width",
            width,
            MIN_TARGET_WIDTH,
            MAX_TARGET_WIDTH,
        ));
    }
    Ok(())
}

pub(crate) fn validate_colors(k: u32) -> Result<(), QuillingError> {
    if !(MIN_COLORS..=MAX_COLORS).contains(&k) {
        return Err(QuillingError::out_of_range(
            "color count",
            k,
            MIN_COLORS,
            MAX_COLORS,
        ));
    }
    Ok(())
}

pub(crate) fn validate_blur_sigma(sigma: f32) -> Result<(), QuillingError> {
    let (min, max) = BLUR_SIGMA_RANGE;
    // NaN fails the range check as well.
    if !(min..=max).contains(&sigma) {
        return Err(QuillingError::out_of_range("blur sigma", sigma, min, max));
    }
    Ok(())
}

pub(crate) fn validate_thresholds(low: f32, high: f32) -> Result<(), QuillingError> {
    if !(low > 0.0 && low <= high && high.is_finite()) {
        return Err(QuillingError::InvalidThresholds { low, high });
    }
    Ok(())
}

/// Builder for [`ProjectConfig`].
#[derive(Debug)]
pub struct ProjectConfigBuilder {
    config: ProjectConfig,
}

impl ProjectConfigBuilder {
    pub fn target_width(mut self, width: u32) -> Self {
        self.config.target_width = width;
        self
    }

    pub fn colors(mut self, k: u32) -> Self {
        self.config.colors = k;
        self
    }

    pub fn quantizer(mut self, kind: QuantizerKind) -> Self {
        self.config.quantizer = kind;
        self
    }

    pub fn edge_detector(mut self, kind: EdgeDetectorKind) -> Self {
        self.config.edge_detector = kind;
        self
    }

    pub fn blur_sigma(mut self, sigma: f32) -> Self {
        self.config.blur_sigma = Some(sigma);
        self
    }

    pub fn thresholds(mut self, low: f32, high: f32) -> Self {
        self.config.low_threshold = low;
        self.config.high_threshold = high;
        self
    }

    pub fn kmeans_attempts(mut self, n: u32) -> Self {
        self.config.kmeans_attempts = n;
        self
    }

    pub fn kmeans_max_iterations(mut self, n: u32) -> Self {
        self.config.kmeans_max_iterations = n;
        self
    }

    pub fn kmeans_epsilon(mut self, eps: f32) -> Self {
        self.config.kmeans_epsilon = eps;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn caption_top(mut self, text: impl Into<String>) -> Self {
        self.config.caption_top = text.into();
        self
    }

    pub fn caption_bottom(mut self, text: impl Into<String>) -> Self {
        self.config.caption_bottom = text.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn keep_intermediate(mut self, v: bool) -> Self {
        self.config.keep_intermediate = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProjectConfig, QuillingError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Colour-reduction strategy.
///
/// Both strategies produce at most `k` colours and assign each pixel to its
/// nearest representative by Euclidean distance in RGB space; they differ
/// in how the representatives are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuantizerKind {
    /// Iterative k-means clustering in RGB space. (default)
    #[default]
    KMeans,
    /// Adaptive palette by median cut over the colour histogram.
    MedianCut,
}

/// Edge-extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeDetectorKind {
    /// Gradient + non-max suppression + hysteresis. White edges on black. (default)
    #[default]
    Canny,
    /// 3×3 Laplacian kernel, inverted and auto-contrasted. Dark edges on white.
    Laplacian,
}

impl EdgeDetectorKind {
    /// Blur sigma used when [`ProjectConfig::blur_sigma`] is not set.
    ///
    /// Canny uses the sigma a 5×5 Gaussian kernel implies (≈1.1); the
    /// Laplacian filter is noisier and gets a radius-2 blur.
    pub fn default_blur_sigma(self) -> f32 {
        match self {
            EdgeDetectorKind::Canny => 1.1,
            EdgeDetectorKind::Laplacian => 2.0,
        }
    }
}
