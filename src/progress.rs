//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ProjectConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves from one stage to the next. Quantizing a
//! large photo can take a noticeable moment, so a UI or terminal can show
//! which stage is running without the library knowing how it is displayed.
//!
//! # Example
//!
//! ```rust
//! use quillgen::{PipelineProgressCallback, ProjectConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { finished: AtomicUsize::new(0) });
//!
//! let config = ProjectConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ProjectStats;
use crate::pipeline::Stage;
use std::sync::Arc;

/// Called by the pipeline as each stage starts and finishes.
///
/// Implementations must be `Send + Sync`: the async entry points run the
/// pipeline on a blocking worker thread. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first stage runs.
    fn on_pipeline_start(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// Called just before `stage` starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when `stage` has finished successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called once after the document has been written.
    fn on_pipeline_complete(&self, stats: &ProjectStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProjectConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
