//! Result types returned by the end-to-end entry points.

use crate::pipeline::document::RenderedDocument;
use crate::pipeline::edges::EdgeMap;
use serde::{Deserialize, Serialize};

/// Everything a caller needs after a successful run: the edge map for
/// on-screen display, the written document, and timing statistics.
#[derive(Debug, Clone)]
pub struct ProjectOutput {
    /// Final edge map (the image embedded in the document).
    pub edges: EdgeMap,
    /// Serialised document and where it was written.
    pub document: RenderedDocument,
    /// Dimensions, colour usage and per-stage timings.
    pub stats: ProjectStats,
}

/// Statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub source_width: u32,
    pub source_height: u32,
    /// Dimensions after resizing (and of the edge map).
    pub width: u32,
    pub height: u32,
    /// Distinct colours in the quantized image (≤ k).
    pub colors_used: usize,
    /// Pixels classified as edges in the final map.
    pub edge_pixels: u64,
    /// Strategy names, e.g. `"kmeans"` / `"canny"`.
    pub quantizer: String,
    pub edge_detector: String,
    pub decode_duration_ms: u64,
    pub resize_duration_ms: u64,
    pub quantize_duration_ms: u64,
    pub edges_duration_ms: u64,
    pub document_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Size of the serialised document in bytes.
    pub document_bytes: usize,
}

/// Basic facts about an input image, available without running the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// `"png"` or `"jpeg"`.
    pub format: String,
    /// Size of the encoded file in bytes.
    pub file_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialise_to_json() {
        let stats = ProjectStats {
            source_width: 1000,
            source_height: 600,
            width: 400,
            height: 240,
            colors_used: 2,
            quantizer: "kmeans".into(),
            edge_detector: "canny".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).expect("serialise");
        assert!(json.contains("\"width\":400"));
        let back: ProjectStats = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, stats);
    }
}
