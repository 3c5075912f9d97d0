//! Peak and valley detection for pulse waveforms
//!
//! Scans a window of AC-centered samples for local extrema with an adaptive
//! prominence threshold and a refractory distance, then derives RR intervals
//! from consecutive peak timestamps. The dicrotic notch of a single beat must
//! not produce a second peak, hence the temporal minimum distance.

use super::FilteredSample;
use serde::{Deserialize, Serialize};

/// Peak detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakDetectorConfig {
    /// Symmetric neighborhood radius for the local-extremum test (2-5)
    pub neighborhood: usize,
    /// Prominence factor k: threshold = mean + k * (max - min)
    pub prominence_k: f32,
    /// Minimum time between accepted peaks (ms)
    pub min_peak_distance_ms: f32,
    /// Minimum plausible RR interval (ms)
    pub min_rr_ms: f32,
    /// Maximum plausible RR interval (ms)
    pub max_rr_ms: f32,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        Self {
            neighborhood: 3,
            prominence_k: 0.4,
            min_peak_distance_ms: 350.0, // 170 BPM refractory
            min_rr_ms: 300.0,
            max_rr_ms: 2000.0,
        }
    }
}

/// One detected extremum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakEvent {
    /// Index into the analyzed window
    pub index: usize,
    /// Sample timestamp (ms)
    pub timestamp_ms: i64,
    /// AC amplitude at the extremum
    pub amplitude: f32,
}

/// Result of analyzing one window
#[derive(Debug, Clone, Default)]
pub struct PeakAnalysis {
    pub peaks: Vec<PeakEvent>,
    pub valleys: Vec<PeakEvent>,
    /// Intervals between consecutive accepted peaks, physiologically banded
    pub rr_intervals_ms: Vec<f32>,
}

/// Local-extremum peak detector with adaptive prominence
pub struct PeakDetector {
    config: PeakDetectorConfig,
}

impl PeakDetector {
    /// Create with default config
    pub fn new() -> Self {
        Self::with_config(PeakDetectorConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: PeakDetectorConfig) -> Self {
        Self { config }
    }

    /// Detect peaks and valleys over a window of filtered samples.
    ///
    /// Windows shorter than twice the extremum neighborhood return an empty
    /// analysis rather than an error.
    pub fn detect(&self, window: &[FilteredSample]) -> PeakAnalysis {
        let r = self.config.neighborhood;
        let n = window.len();
        if n < 2 * (2 * r + 1) {
            return PeakAnalysis::default();
        }

        let (mean, min, max) = window_stats(window);
        let range = max - min;
        let peak_threshold = mean + self.config.prominence_k * range;
        let valley_threshold = mean - self.config.prominence_k * range;

        let mut peaks: Vec<PeakEvent> = Vec::new();
        let mut valleys: Vec<PeakEvent> = Vec::new();

        for i in r..n - r {
            let v = window[i].filtered;

            let is_max = (i - r..=i + r).all(|j| v >= window[j].filtered);
            if is_max && v > peak_threshold {
                if let Some(last) = peaks.last() {
                    let dt = (window[i].timestamp_ms - last.timestamp_ms) as f32;
                    if dt < self.config.min_peak_distance_ms {
                        continue;
                    }
                }
                peaks.push(PeakEvent {
                    index: i,
                    timestamp_ms: window[i].timestamp_ms,
                    amplitude: v,
                });
                continue;
            }

            let is_min = (i - r..=i + r).all(|j| v <= window[j].filtered);
            if is_min && v < valley_threshold {
                if let Some(last) = valleys.last() {
                    let dt = (window[i].timestamp_ms - last.timestamp_ms) as f32;
                    if dt < self.config.min_peak_distance_ms {
                        continue;
                    }
                }
                valleys.push(PeakEvent {
                    index: i,
                    timestamp_ms: window[i].timestamp_ms,
                    amplitude: v,
                });
            }
        }

        let mut rr_intervals_ms = Vec::with_capacity(peaks.len().saturating_sub(1));
        for pair in peaks.windows(2) {
            let dt = (pair[1].timestamp_ms - pair[0].timestamp_ms) as f32;
            // Out-of-band intervals are discarded, never clamped
            if dt >= self.config.min_rr_ms && dt <= self.config.max_rr_ms {
                rr_intervals_ms.push(dt);
            }
        }

        PeakAnalysis {
            peaks,
            valleys,
            rr_intervals_ms,
        }
    }
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn window_stats(window: &[FilteredSample]) -> (f32, f32, f32) {
    let mut sum = 0.0f32;
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for s in window {
        sum += s.filtered;
        min = min.min(s.filtered);
        max = max.max(s.filtered);
    }
    (sum / window.len() as f32, min, max)
}
