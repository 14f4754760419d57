//! # engine::pattern
//!
//! **Pattern Detector** — correlation-based chart shape matcher.
//!
//! ```text
//! last K prices ──▶ min/max normalise to [0,1] ──▶ cross-correlate with
//!                                                  5-point kernels
//!   triangle           [ 1, 0.5, 0, -0.5, -1 ]
//!   head & shoulders   [ 1, -1,  2, -1,    1 ]
//!
//! |response[i]| > threshold  ──▶  Pattern { start: i, end: i + 4 }
//! ```
//!
//! A window shorter than K, or a flat window (max == min), yields no patterns.

use crate::config::AnalyticsConfig;
use crate::models::{Pattern, PatternType};

const TRIANGLE_KERNEL: [f64; 5] = [1.0, 0.5, 0.0, -0.5, -1.0];
const HEAD_AND_SHOULDERS_KERNEL: [f64; 5] = [1.0, -1.0, 2.0, -1.0, 1.0];

const KERNELS: [(PatternType, &[f64; 5]); 2] = [
    (PatternType::Triangle, &TRIANGLE_KERNEL),
    (PatternType::HeadAndShoulders, &HEAD_AND_SHOULDERS_KERNEL),
];

#[derive(Debug, Clone)]
pub struct PatternDetector {
    window:    usize,
    threshold: f64,
}

impl PatternDetector {
    pub fn new(window: usize, threshold: f64) -> Self {
        Self { window: window.max(TRIANGLE_KERNEL.len()), threshold }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.window, config.pattern_threshold)
    }

    /// Scan the most recent window of `prices` (oldest first).
    ///
    /// Hits are returned triangle-first, each group in index order. Indices are
    /// relative to the window, not to `prices`.
    pub fn detect(&self, prices: &[f64]) -> Vec<Pattern> {
        if prices.len() < self.window {
            return Vec::new();
        }

        let Some(normalized) = normalize(&prices[prices.len() - self.window..]) else {
            return Vec::new();
        };

        let mut patterns = Vec::new();
        for (pattern_type, kernel) in KERNELS {
            for (i, response) in correlate(&normalized, kernel).into_iter().enumerate() {
                let magnitude = response.abs();
                if magnitude > self.threshold {
                    patterns.push(Pattern {
                        pattern_type,
                        confidence:  magnitude.min(1.0),
                        start_index: i,
                        end_index:   i + kernel.len() - 1,
                    });
                }
            }
        }
        patterns
    }
}

/// Min/max normalisation; `None` for a flat (or non-finite) window.
fn normalize(window: &[f64]) -> Option<Vec<f64>> {
    let min = window.iter().copied().fold(f64::INFINITY, f64::min);
    let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range == 0.0 {
        return None;
    }
    Some(window.iter().map(|x| (x - min) / range).collect())
}

/// Valid-mode cross-correlation: `series.len() - kernel.len() + 1` responses.
fn correlate(series: &[f64], kernel: &[f64]) -> Vec<f64> {
    series
        .windows(kernel.len())
        .map(|w| w.iter().zip(kernel).map(|(x, k)| x * k).sum())
        .collect()
}
