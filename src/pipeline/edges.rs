//! Edge extraction: derive a single-channel outline map from the quantized image.
//!
//! Every detector runs the same front half: RGB → BT.601 luma → one Gaussian
//! blur at the configured sigma. The back half is where they differ:
//!
//! * [`CannyDetector`]: Sobel gradients, non-maximum suppression and
//!   hysteresis thresholding. Produces thin, binary edges, **white on black**.
//! * [`LaplacianDetector`]: a 3×3 "find edges" kernel, then invert and
//!   auto-contrast. Produces soft edges, **dark on white**.
//!
//! The convention is recorded on the returned [`EdgeMap`] so callers never
//! have to guess which pixels are edges.

use crate::config::{validate_blur_sigma, validate_thresholds, ProjectConfig};
use crate::error::QuillingError;
use image::{imageops, DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which side of the intensity scale marks an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgePolarity {
    /// Edges are bright (≥ 128) on a dark background.
    BrightOnDark,
    /// Edges are dark (< 128) on a light background.
    DarkOnLight,
}

/// A grayscale edge map plus its polarity.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMap {
    image: GrayImage,
    polarity: EdgePolarity,
}

impl EdgeMap {
    pub fn new(image: GrayImage, polarity: EdgePolarity) -> Self {
        Self { image, polarity }
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    pub fn polarity(&self) -> EdgePolarity {
        self.polarity
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether an intensity counts as an edge under this map's polarity.
    pub fn is_edge(&self, value: u8) -> bool {
        match self.polarity {
            EdgePolarity::BrightOnDark => value >= 128,
            EdgePolarity::DarkOnLight => value < 128,
        }
    }

    pub fn edge_pixel_count(&self) -> u64 {
        self.image.pixels().filter(|p| self.is_edge(p[0])).count() as u64
    }

    /// Share of pixels classified as edges, in `[0, 1]`.
    pub fn edge_fraction(&self) -> f64 {
        let total = u64::from(self.width()) * u64::from(self.height());
        if total == 0 {
            return 0.0;
        }
        self.edge_pixel_count() as f64 / total as f64
    }

    /// The map expanded to three channels, for formats without grayscale.
    pub fn to_rgb(&self) -> RgbImage {
        DynamicImage::ImageLuma8(self.image.clone()).to_rgb8()
    }
}

/// An edge-extraction strategy.
pub trait EdgeDetector: Send + Sync {
    /// Short identifier used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Polarity of the maps this detector produces.
    fn polarity(&self) -> EdgePolarity;

    /// Compute the edge map. Output has the same dimensions as `image`.
    fn detect(&self, image: &RgbImage) -> Result<EdgeMap, QuillingError>;
}

/// BT.601 luma in 16-bit fixed point, `(19595 R + 38470 G + 7471 B) >> 16`.
pub fn luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let v = 19595 * u32::from(r) + 38470 * u32::from(g) + 7471 * u32::from(b);
        Luma([((v + 0x8000) >> 16).min(255) as u8])
    })
}

/// Luma conversion followed by the detector's single Gaussian blur.
fn smoothed_luma(image: &RgbImage, sigma: f32) -> Result<GrayImage, QuillingError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(QuillingError::EmptyImage);
    }
    validate_blur_sigma(sigma)?;
    Ok(gaussian_blur_f32(&luma(image), sigma))
}

// ── Canny ────────────────────────────────────────────────────────────────

/// Canny edge detector.
///
/// Thresholds apply to the L1 Sobel magnitude `|gx| + |gy|`, so a sharp luma
/// step of height `d` scores `4d` before blurring and about `2.4d` after the
/// default σ = 1.1 blur.
#[derive(Debug, Clone)]
pub struct CannyDetector {
    pub blur_sigma: f32,
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl Default for CannyDetector {
    fn default() -> Self {
        Self {
            blur_sigma: crate::config::EdgeDetectorKind::Canny.default_blur_sigma(),
            low_threshold: 50.0,
            high_threshold: 150.0,
        }
    }
}

impl CannyDetector {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            blur_sigma: config.effective_blur_sigma(),
            low_threshold: config.low_threshold,
            high_threshold: config.high_threshold,
        }
    }
}

impl EdgeDetector for CannyDetector {
    fn name(&self) -> &'static str {
        "canny"
    }

    fn polarity(&self) -> EdgePolarity {
        EdgePolarity::BrightOnDark
    }

    fn detect(&self, image: &RgbImage) -> Result<EdgeMap, QuillingError> {
        validate_thresholds(self.low_threshold, self.high_threshold)?;
        let blurred = smoothed_luma(image, self.blur_sigma)?;
        let edges = canny(&blurred, self.low_threshold, self.high_threshold);
        debug!(
            "canny: {}x{} (σ={}, low={}, high={})",
            edges.width(),
            edges.height(),
            self.blur_sigma,
            self.low_threshold,
            self.high_threshold
        );
        Ok(EdgeMap::new(edges, self.polarity()))
    }
}

// ── Laplacian ────────────────────────────────────────────────────────────

/// 3×3 Laplacian "find edges" filter, inverted and auto-contrasted.
#[derive(Debug, Clone)]
pub struct LaplacianDetector {
    pub blur_sigma: f32,
}

impl Default for LaplacianDetector {
    fn default() -> Self {
        Self {
            blur_sigma: crate::config::EdgeDetectorKind::Laplacian.default_blur_sigma(),
        }
    }
}

impl LaplacianDetector {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            blur_sigma: config.effective_blur_sigma(),
        }
    }
}

impl EdgeDetector for LaplacianDetector {
    fn name(&self) -> &'static str {
        "laplacian"
    }

    fn polarity(&self) -> EdgePolarity {
        EdgePolarity::DarkOnLight
    }

    fn detect(&self, image: &RgbImage) -> Result<EdgeMap, QuillingError> {
        let blurred = smoothed_luma(image, self.blur_sigma)?;
        let mut edges = find_edges(&blurred);
        imageops::invert(&mut edges);
        autocontrast(&mut edges);
        debug!(
            "laplacian: {}x{} (σ={})",
            edges.width(),
            edges.height(),
            self.blur_sigma
        );
        Ok(EdgeMap::new(edges, self.polarity()))
    }
}

const TAN_22_5: f32 = 0.414_213_56;
const TAN_67_5: f32 = 2.414_213_6;

/// Canny on an already smoothed image: Sobel gradients, non-maximum
/// suppression, then hysteresis.
///
/// A pixel survives suppression when its magnitude is above `low`, strictly
/// greater than the neighbour behind it along the gradient and no smaller
/// than the one ahead, so a two-pixel plateau thins to one pixel. Survivors
/// above `high` seed edges; the rest join only when 8-connected to a seed.
/// Edges are 255, everything else 0.
pub fn canny(smoothed: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = smoothed.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let gx = horizontal_sobel(smoothed);
    let gy = vertical_sobel(smoothed);
    let width = w as usize;
    let magnitude: Vec<f32> = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(a, b)| f32::from(a[0]).abs() + f32::from(b[0]).abs())
        .collect();
    let at = |x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= i64::from(w) || y >= i64::from(h) {
            0.0
        } else {
            magnitude[y as usize * width + x as usize]
        }
    };

    let mut thin = vec![0f32; magnitude.len()];
    for y in 0..h {
        for x in 0..w {
            let i = y as usize * width + x as usize;
            let m = magnitude[i];
            if m <= low {
                continue;
            }
            let dx = f32::from(gx.get_pixel(x, y)[0]);
            let dy = f32::from(gy.get_pixel(x, y)[0]);
            let (xi, yi) = (i64::from(x), i64::from(y));
            let (behind, ahead) = if dy.abs() <= dx.abs() * TAN_22_5 {
                (at(xi - 1, yi), at(xi + 1, yi))
            } else if dy.abs() >= dx.abs() * TAN_67_5 {
                (at(xi, yi - 1), at(xi, yi + 1))
            } else if (dx > 0.0) == (dy > 0.0) {
                (at(xi - 1, yi - 1), at(xi + 1, yi + 1))
            } else {
                (at(xi + 1, yi - 1), at(xi - 1, yi + 1))
            };
            if m > behind && m >= ahead {
                thin[i] = m;
            }
        }
    }

    let mut stack: Vec<(u32, u32)> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let i = y as usize * width + x as usize;
            if thin[i] <= high || out.get_pixel(x, y)[0] != 0 {
                continue;
            }
            out.put_pixel(x, y, Luma([255]));
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for ny in cy.saturating_sub(1)..=(cy + 1).min(h - 1) {
                    for nx in cx.saturating_sub(1)..=(cx + 1).min(w - 1) {
                        let j = ny as usize * width + nx as usize;
                        if thin[j] > low && out.get_pixel(nx, ny)[0] == 0 {
                            out.put_pixel(nx, ny, Luma([255]));
                            stack.push((nx, ny));
                        }
                    }
                }
            }
        }
    }
    out
}

/// Convolve with `[-1 -1 -1; -1 8 -1; -1 -1 -1]`, clamping to 0–255.
///
/// Borders replicate the nearest pixel, so a flat image yields all zeros.
pub fn find_edges(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let at = |x: i64, y: i64| -> i32 {
        let cx = x.clamp(0, i64::from(w) - 1) as u32;
        let cy = y.clamp(0, i64::from(h) - 1) as u32;
        i32::from(gray.get_pixel(cx, cy)[0])
    };

    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (i64::from(x), i64::from(y));
        let mut sum = 9 * at(x, y);
        for dy in -1..=1 {
            for dx in -1..=1 {
                sum -= at(x + dx, y + dy);
            }
        }
        Luma([sum.clamp(0, 255) as u8])
    })
}

/// Stretch intensities so the darkest pixel becomes 0 and the brightest 255.
///
/// A map with a single intensity is left untouched.
pub fn autocontrast(image: &mut GrayImage) {
    let (lo, hi) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if hi <= lo {
        return;
    }

    let scale = 255.0 / f32::from(hi - lo);
    let lut: Vec<u8> = (0..=255u8)
        .map(|v| {
            (f32::from(v.saturating_sub(lo)) * scale)
                .round()
                .clamp(0.0, 255.0) as u8
        })
        .collect();
    for p in image.pixels_mut() {
        p[0] = lut[usize::from(p[0])];
    }
}

/// Detect edges with the default strategy (Canny, 50/150).
pub fn detect_edges(image: &RgbImage) -> Result<EdgeMap, QuillingError> {
    CannyDetector::default().detect(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// White square on a blue background.
    fn square(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if (w / 4..3 * w / 4).contains(&x) && (h / 4..3 * h / 4).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 200])
            }
        })
    }

    fn detectors() -> Vec<Box<dyn EdgeDetector>> {
        vec![
            Box::new(CannyDetector::default()),
            Box::new(LaplacianDetector::default()),
        ]
    }

    #[test]
    fn output_matches_input_dimensions() {
        for d in detectors() {
            for (w, h) in [(40, 30), (33, 21), (64, 12)] {
                let map = d.detect(&square(w, h)).unwrap();
                assert_eq!((map.width(), map.height()), (w, h), "{}", d.name());
                assert_eq!(map.polarity(), d.polarity());
            }
        }
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = RgbImage::from_pixel(400, 240, Rgb([0, 0, 255]));
        for d in detectors() {
            let map = d.detect(&img).unwrap();
            assert_eq!(map.edge_pixel_count(), 0, "{}", d.name());
        }
    }

    #[test]
    fn square_outline_is_found() {
        let img = square(80, 60);
        for d in detectors() {
            let map = d.detect(&img).unwrap();
            assert!(map.edge_pixel_count() > 0, "{}", d.name());
            // Centre of the square and the far corner are flat.
            assert!(!map.is_edge(map.image().get_pixel(40, 30)[0]), "{}", d.name());
            assert!(!map.is_edge(map.image().get_pixel(0, 0)[0]), "{}", d.name());
            // Something along the left side of the square is an edge.
            let left_edge = (18..=22).any(|x| map.is_edge(map.image().get_pixel(x, 30)[0]));
            assert!(left_edge, "{}", d.name());
        }
    }

    #[test]
    fn detection_is_deterministic() {
        let img = square(64, 48);
        for d in detectors() {
            let a = d.detect(&img).unwrap();
            let b = d.detect(&img).unwrap();
            assert_eq!(a.image().as_raw(), b.image().as_raw(), "{}", d.name());
        }
    }

    #[test]
    fn empty_image_is_invalid_input() {
        for d in detectors() {
            let err = d.detect(&RgbImage::new(0, 0)).unwrap_err();
            assert!(matches!(err, QuillingError::EmptyImage), "{}", d.name());
        }
        assert!(detect_edges(&RgbImage::new(0, 5)).is_err());
    }

    #[test]
    fn bad_settings_rejected() {
        let img = square(10, 10);
        let d = CannyDetector {
            low_threshold: 200.0,
            high_threshold: 100.0,
            ..Default::default()
        };
        assert!(matches!(
            d.detect(&img).unwrap_err(),
            QuillingError::InvalidThresholds { .. }
        ));
        let d = LaplacianDetector { blur_sigma: 0.0 };
        assert!(matches!(
            d.detect(&img).unwrap_err(),
            QuillingError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn find_edges_flat_is_zero() {
        let gray = GrayImage::from_pixel(5, 5, Luma([77]));
        assert!(find_edges(&gray).pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn find_edges_spot() {
        let mut gray = GrayImage::new(3, 3);
        gray.put_pixel(1, 1, Luma([10]));
        let out = find_edges(&gray);
        assert_eq!(out.get_pixel(1, 1)[0], 80);
        // Neighbours go negative and clamp to zero.
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn autocontrast_stretches_and_skips_flat() {
        let mut img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 100 } else { 200 }]));
        autocontrast(&mut img);
        assert_eq!(img.as_raw(), &vec![0, 255]);

        let mut narrow = GrayImage::from_fn(2, 1, |x, _| Luma([250 + x as u8]));
        autocontrast(&mut narrow);
        assert_eq!(narrow.as_raw(), &vec![0, 255]);

        let mut flat = GrayImage::from_pixel(3, 2, Luma([250]));
        autocontrast(&mut flat);
        assert!(flat.pixels().all(|p| p[0] == 250));
    }

    /// Top half `top`, bottom half `bottom`.
    fn split(w: u32, h: u32, top: [u8; 3], bottom: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(w, h, |_, y| Rgb(if y < h / 2 { top } else { bottom }))
    }

    /// Vertical stripes of `half` px, alternating between two greys 200 apart.
    fn stripes(w: u32, h: u32, half: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| {
            if (x / half) % 2 == 0 {
                Rgb([230, 230, 230])
            } else {
                Rgb([30, 30, 30])
            }
        })
    }

    /// Edge pixels at least `margin` px away from the left and right borders.
    fn interior_edges(map: &EdgeMap, margin: u32) -> usize {
        map.image()
            .enumerate_pixels()
            .filter(|(x, _, p)| *x >= margin && *x < map.width() - margin && map.is_edge(p[0]))
            .count()
    }

    #[test]
    fn luma_uses_bt601_weights() {
        let img = RgbImage::from_fn(4, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            2 => Rgb([0, 0, 255]),
            _ => Rgb([255, 255, 255]),
        });
        assert_eq!(luma(&img).as_raw(), &vec![76, 150, 29, 255]);
    }

    #[test]
    fn canny_thins_a_step_to_one_line() {
        let gray = GrayImage::from_fn(20, 10, |x, _| Luma([if x < 10 { 40 } else { 200 }]));
        let edges = canny(&gray, 50.0, 150.0);
        for y in 0..10 {
            let row: Vec<u32> = (0..20).filter(|&x| edges.get_pixel(x, y)[0] == 255).collect();
            assert_eq!(row.len(), 1, "row {y}: {row:?}");
            assert!((9..=10).contains(&row[0]));
        }
        assert!(edges.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn canny_hysteresis_keeps_weak_pixels_only_when_connected() {
        // Step 0→100 scores 400 (strong), 100→120 scores 80 (weak).
        let gray = GrayImage::from_fn(30, 10, |x, _| {
            Luma([match x {
                0..=9 => 0,
                10..=19 => 100,
                _ => 120,
            }])
        });
        let edges = canny(&gray, 50.0, 150.0);
        assert!((9..=10).any(|x| edges.get_pixel(x, 5)[0] == 255));
        assert!((19..=20).all(|x| edges.get_pixel(x, 5)[0] == 0));

        let lone_weak = canny(&gray, 50.0, 500.0);
        assert!(lone_weak.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn moderate_contrast_boundaries_are_found() {
        // Sky over meadow: luma 168 over 101.
        let landscape = split(300, 200, [120, 180, 230], [40, 140, 60]);
        assert!(CannyDetector::default().detect(&landscape).unwrap().edge_pixel_count() > 0);

        // Red beside blue: luma 81 against 43.
        let red_blue = RgbImage::from_fn(200, 100, |x, _| {
            if x < 100 {
                Rgb([200, 30, 30])
            } else {
                Rgb([20, 20, 220])
            }
        });
        assert!(LaplacianDetector::default().detect(&red_blue).unwrap().edge_pixel_count() > 0);

        // Plain grey steps of 30 and 60 levels.
        for step in [30u8, 60] {
            let img = split(120, 80, [100, 100, 100], [100 + step; 3]);
            let laplacian = LaplacianDetector::default().detect(&img).unwrap();
            assert!(laplacian.edge_pixel_count() > 0, "laplacian, step {step}");

            let canny = CannyDetector {
                low_threshold: 20.0,
                high_threshold: 60.0,
                ..Default::default()
            };
            assert!(canny.detect(&img).unwrap().edge_pixel_count() > 0, "canny, step {step}");
        }
    }

    #[test]
    fn blur_sigma_controls_canny_detail() {
        let img = stripes(96, 32, 4);
        let counts: Vec<usize> = [1.0f32, 1.5, 2.0, 2.5, 3.0]
            .iter()
            .map(|&sigma| {
                let config = ProjectConfig::builder().blur_sigma(sigma).build().unwrap();
                let detector = CannyDetector::from_config(&config);
                assert_eq!(detector.blur_sigma, sigma);
                interior_edges(&detector.detect(&img).unwrap(), 14)
            })
            .collect();

        assert!(counts[0] > 0, "{counts:?}");
        assert_eq!(counts[4], 0, "{counts:?}");
        assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{counts:?}");
    }

    #[test]
    fn to_rgb_expands_channels() {
        let map = EdgeMap::new(GrayImage::from_pixel(2, 2, Luma([42])), EdgePolarity::BrightOnDark);
        let rgb = map.to_rgb();
        assert_eq!(*rgb.get_pixel(1, 1), Rgb([42, 42, 42]));
        assert_eq!(map.edge_fraction(), 0.0);
    }
}
