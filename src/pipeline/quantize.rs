//! Colour quantization: reduce a photo to at most `k` representative colours.
//!
//! Both strategies work on the colour histogram (each unique colour with its
//! pixel count) rather than on the raw pixel list. Clustering a weighted
//! histogram gives the same centroids as clustering every pixel, but a
//! resized photo rarely has more than a few tens of thousands of unique
//! colours, so it is far cheaper than iterating 800 × 600 points.
//!
//! Whatever the palette, the final mapping is the same: every pixel is
//! replaced by its nearest palette entry by Euclidean distance in RGB.

use crate::config::{validate_colors, ProjectConfig};
use crate::error::QuillingError;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::debug;

/// Unique colours of an image with their pixel counts, sorted by colour.
///
/// The sort makes every downstream computation independent of hash-map
/// iteration order.
#[derive(Debug, Clone)]
pub struct ColorHistogram {
    entries: Vec<([u8; 3], u32)>,
}

impl ColorHistogram {
    pub fn from_image(image: &RgbImage) -> Self {
        let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
        for px in image.pixels() {
            *counts.entry(px.0).or_insert(0) += 1;
        }
        let mut entries: Vec<_> = counts.into_iter().collect();
        entries.sort_unstable_by_key(|&(color, _)| color);
        Self { entries }
    }

    pub fn entries(&self) -> &[([u8; 3], u32)] {
        &self.entries
    }

    /// Number of distinct colours.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Number of distinct colours in `image`.
pub fn count_colors(image: &RgbImage) -> usize {
    ColorHistogram::from_image(image).len()
}

/// A colour-reduction strategy.
///
/// Implementors only choose the palette; validation and pixel mapping are
/// shared by the provided [`Quantizer::quantize`].
pub trait Quantizer: Send + Sync {
    /// Short identifier used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Choose at most `k` representative colours for `histogram`.
    ///
    /// Only called when the histogram has more than `k` distinct colours.
    fn build_palette(&self, histogram: &ColorHistogram, k: usize) -> Vec<[u8; 3]>;

    /// Return a copy of `image` using at most `k` distinct colours.
    fn quantize(&self, image: &RgbImage, k: u32) -> Result<RgbImage, QuillingError> {
        validate_colors(k)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(QuillingError::EmptyImage);
        }

        let histogram = ColorHistogram::from_image(image);
        let k = k as usize;
        if histogram.len() <= k {
            debug!(
                "{}: image already has {} ≤ {} colours",
                self.name(),
                histogram.len(),
                k
            );
            return Ok(image.clone());
        }

        let mut palette = self.build_palette(&histogram, k);
        palette.sort_unstable();
        palette.dedup();
        palette.truncate(k);
        debug!(
            "{}: {} colours → palette of {}",
            self.name(),
            histogram.len(),
            palette.len()
        );
        Ok(map_to_palette(image, &histogram, &palette))
    }
}

fn distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}

fn nearest(color: [u8; 3], palette: &[[u8; 3]]) -> [u8; 3] {
    palette
        .iter()
        .copied()
        .min_by_key(|&p| distance_sq(color, p))
        .unwrap_or(color)
}

/// Replace every pixel with its nearest palette colour.
fn map_to_palette(image: &RgbImage, histogram: &ColorHistogram, palette: &[[u8; 3]]) -> RgbImage {
    let lookup: HashMap<[u8; 3], [u8; 3]> = histogram
        .entries()
        .iter()
        .map(|&(color, _)| (color, nearest(color, palette)))
        .collect();

    let mut out = image.clone();
    for px in out.pixels_mut() {
        if let Some(&mapped) = lookup.get(&px.0) {
            *px = Rgb(mapped);
        }
    }
    out
}

fn to_u8(c: [f32; 3]) -> [u8; 3] {
    c.map(|v| v.round().clamp(0.0, 255.0) as u8)
}

// ── Strategy (a): k-means ────────────────────────────────────────────────

/// Iterative k-means clustering in RGB space.
///
/// Each attempt seeds centroids with k-means++ and then alternates
/// assignment and mean updates until no centroid moves further than
/// `epsilon` or `max_iterations` is reached. The attempt with the lowest
/// compactness (weighted sum of squared distances) wins. Seeding comes from
/// a fixed-seed RNG, so the same input always yields the same palette.
#[derive(Debug, Clone)]
pub struct KMeansQuantizer {
    pub attempts: u32,
    pub max_iterations: u32,
    pub epsilon: f32,
    pub seed: u64,
}

impl Default for KMeansQuantizer {
    fn default() -> Self {
        let config = ProjectConfig::default();
        Self::from_config(&config)
    }
}

struct Clustering {
    centers: Vec<[f32; 3]>,
    compactness: f64,
}

fn distance_sq_f(a: [f32; 3], b: [f32; 3]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn nearest_center(point: [f32; 3], centers: &[[f32; 3]]) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, &c) in centers.iter().enumerate() {
        let d = distance_sq_f(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Pick an index with probability proportional to `weights`.
fn weighted_pick(weights: &[f64], rng: &mut StdRng) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let mut target = rng.gen::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        if target < w {
            return Some(i);
        }
        target -= w;
    }
    weights.iter().rposition(|&w| w > 0.0)
}

impl KMeansQuantizer {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            attempts: config.kmeans_attempts.max(1),
            max_iterations: config.kmeans_max_iterations.max(1),
            epsilon: config.kmeans_epsilon,
            seed: config.seed,
        }
    }

    fn seed_centers(points: &[([f32; 3], f64)], k: usize, rng: &mut StdRng) -> Vec<[f32; 3]> {
        let weights: Vec<f64> = points.iter().map(|&(_, w)| w).collect();
        let mut centers = Vec::with_capacity(k);
        let Some(first) = weighted_pick(&weights, rng) else {
            return centers;
        };
        centers.push(points[first].0);

        let mut min_dist: Vec<f64> = points
            .iter()
            .map(|&(p, _)| f64::from(distance_sq_f(p, centers[0])))
            .collect();

        while centers.len() < k {
            let scores: Vec<f64> = points
                .iter()
                .zip(&min_dist)
                .map(|(&(_, w), &d)| w * d)
                .collect();
            // Every point already coincides with a centre.
            let Some(next) = weighted_pick(&scores, rng) else {
                break;
            };
            let c = points[next].0;
            centers.push(c);
            for (d, &(p, _)) in min_dist.iter_mut().zip(points) {
                *d = d.min(f64::from(distance_sq_f(p, c)));
            }
        }
        centers
    }

    fn run_once(&self, points: &[([f32; 3], f64)], k: usize, rng: &mut StdRng) -> Clustering {
        let mut centers = Self::seed_centers(points, k, rng);

        for iteration in 0..self.max_iterations {
            let mut sums = vec![[0f64; 3]; centers.len()];
            let mut weights = vec![0f64; centers.len()];
            for &(p, w) in points {
                let (idx, _) = nearest_center(p, &centers);
                for ch in 0..3 {
                    sums[idx][ch] += f64::from(p[ch]) * w;
                }
                weights[idx] += w;
            }

            let mut max_shift = 0f32;
            for (i, center) in centers.iter_mut().enumerate() {
                // Empty clusters keep their previous centroid.
                if weights[i] > 0.0 {
                    let updated = sums[i].map(|s| (s / weights[i]) as f32);
                    max_shift = max_shift.max(distance_sq_f(*center, updated).sqrt());
                    *center = updated;
                }
            }

            if max_shift <= self.epsilon {
                debug!("k-means converged after {} iterations", iteration + 1);
                break;
            }
        }

        let compactness = points
            .iter()
            .map(|&(p, w)| f64::from(nearest_center(p, &centers).1) * w)
            .sum();
        Clustering {
            centers,
            compactness,
        }
    }
}

impl Quantizer for KMeansQuantizer {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn build_palette(&self, histogram: &ColorHistogram, k: usize) -> Vec<[u8; 3]> {
        let points: Vec<([f32; 3], f64)> = histogram
            .entries()
            .iter()
            .map(|&(c, n)| (c.map(f32::from), f64::from(n)))
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<Clustering> = None;
        for _ in 0..self.attempts {
            let run = self.run_once(&points, k, &mut rng);
            if best
                .as_ref()
                .map_or(true, |b| run.compactness < b.compactness)
            {
                best = Some(run);
            }
        }

        best.map(|b| b.centers.into_iter().map(to_u8).collect())
            .unwrap_or_default()
    }
}

// ── Strategy (b): median cut ─────────────────────────────────────────────

/// Adaptive palette built by median cut over the colour histogram.
///
/// Starts with one box holding every colour and repeatedly splits the box
/// with the widest channel range at the population-weighted median of that
/// channel until there are `k` boxes. Each box contributes its weighted
/// mean colour.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianCutQuantizer;

struct ColorBox {
    entries: Vec<([u8; 3], u32)>,
}

impl ColorBox {
    /// Widest channel and its extent.
    fn widest_channel(&self) -> (usize, u8) {
        (0..3)
            .map(|ch| {
                let (lo, hi) = self
                    .entries
                    .iter()
                    .fold((u8::MAX, u8::MIN), |(lo, hi), (c, _)| {
                        (lo.min(c[ch]), hi.max(c[ch]))
                    });
                (ch, hi.saturating_sub(lo))
            })
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .unwrap_or((0, 0))
    }

    fn population(&self) -> u64 {
        self.entries.iter().map(|&(_, n)| u64::from(n)).sum()
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let (ch, _) = self.widest_channel();
        self.entries.sort_unstable_by_key(|&(c, _)| (c[ch], c));

        let half = self.population().div_ceil(2);
        let mut acc = 0u64;
        let mut at = self.entries.len() - 1;
        for (i, &(_, n)) in self.entries.iter().enumerate() {
            acc += u64::from(n);
            if acc >= half {
                at = i + 1;
                break;
            }
        }
        let at = at.clamp(1, self.entries.len() - 1);
        let upper = self.entries.split_off(at);
        (self, ColorBox { entries: upper })
    }

    fn mean(&self) -> [u8; 3] {
        let mut sums = [0f64; 3];
        let mut total = 0f64;
        for &(c, n) in &self.entries {
            for ch in 0..3 {
                sums[ch] += f64::from(c[ch]) * f64::from(n);
            }
            total += f64::from(n);
        }
        to_u8(sums.map(|s| (s / total.max(1.0)) as f32))
    }
}

impl Quantizer for MedianCutQuantizer {
    fn name(&self) -> &'static str {
        "median-cut"
    }

    fn build_palette(&self, histogram: &ColorHistogram, k: usize) -> Vec<[u8; 3]> {
        let mut boxes = vec![ColorBox {
            entries: histogram.entries().to_vec(),
        }];

        while boxes.len() < k {
            let candidate = boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.entries.len() > 1)
                .max_by(|(ia, a), (ib, b)| {
                    a.widest_channel()
                        .1
                        .cmp(&b.widest_channel().1)
                        .then(a.population().cmp(&b.population()))
                        .then(ib.cmp(ia))
                })
                .map(|(i, _)| i);

            let Some(idx) = candidate else { break };
            let (lower, upper) = boxes.swap_remove(idx).split();
            boxes.push(lower);
            boxes.push(upper);
        }

        boxes.iter().map(ColorBox::mean).collect()
    }
}

/// Quantize with the default strategy (k-means, default settings).
pub fn quantize(image: &RgbImage, k: u32) -> Result<RgbImage, QuillingError> {
    KMeansQuantizer::default().quantize(image, k)
}
