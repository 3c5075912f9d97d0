//! Heart-rate aggregation over RR intervals
//!
//! Owns the bounded RR-interval buffer shared by BPM estimation and the
//! arrhythmia heuristic. BPM comes from a recency-weighted mean of the
//! plausible intervals, with confidence derived from their spread and an
//! exponential blend so one spurious beat cannot jump the display.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartRateConfig {
    /// Minimum accepted RR interval (ms)
    pub min_rr_ms: f32,
    /// Maximum accepted RR interval (ms)
    pub max_rr_ms: f32,
    /// Bound on the RR ring buffer
    pub max_intervals: usize,
    /// Lowest reportable BPM
    pub min_bpm: u16,
    /// Highest reportable BPM
    pub max_bpm: u16,
    /// Exponential blend toward a new BPM estimate (0-1)
    pub smoothing_alpha: f32,
    /// Relative RR variability at which confidence reaches 0
    pub max_cv: f32,
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            min_rr_ms: 300.0,  // 200 BPM
            max_rr_ms: 1500.0, // 40 BPM
            max_intervals: 20,
            min_bpm: 40,
            max_bpm: 200,
            smoothing_alpha: 0.3,
            max_cv: 0.5,
        }
    }
}

/// BPM estimate with confidence
#[derive(Debug, Clone, Copy, Default)]
pub struct BpmEstimate {
    /// Beats per minute; 0 means not enough data
    pub bpm: u16,
    /// Confidence in [0, 100] from inverse interval variability
    pub confidence: f32,
}

/// Time-domain heart-rate variability metrics
#[derive(Debug, Clone, Copy)]
pub struct HrvMetrics {
    pub mean_ibi_ms: f32,
    pub sdnn_ms: f32,
    pub rmssd_ms: f32,
}

/// RR-interval aggregator
pub struct HeartRateAggregator {
    config: HeartRateConfig,
    intervals: VecDeque<f32>,
    smoothed_bpm: Option<f32>,
}

impl HeartRateAggregator {
    /// Create with default config
    pub fn new() -> Self {
        Self::with_config(HeartRateConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: HeartRateConfig) -> Self {
        Self {
            intervals: VecDeque::with_capacity(config.max_intervals),
            config,
            smoothed_bpm: None,
        }
    }

    /// Append a new RR interval. Values outside the plausible band are
    /// discarded, not clamped.
    ///
    /// Returns true when the interval was accepted.
    pub fn push_interval(&mut self, rr_ms: f32) -> bool {
        if !rr_ms.is_finite() || rr_ms < self.config.min_rr_ms || rr_ms > self.config.max_rr_ms {
            return false;
        }
        self.intervals.push_back(rr_ms);
        while self.intervals.len() > self.config.max_intervals {
            self.intervals.pop_front();
        }
        true
    }

    /// Stored intervals, oldest first. Shared with the arrhythmia heuristic.
    pub fn intervals(&self) -> impl Iterator<Item = f32> + '_ {
        self.intervals.iter().copied()
    }

    /// Number of stored intervals
    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    /// Compute the current BPM estimate.
    ///
    /// Fewer than two stored intervals yield the neutral estimate (bpm 0).
    pub fn compute(&mut self) -> BpmEstimate {
        let valid: Vec<f32> = self
            .intervals
            .iter()
            .copied()
            .filter(|rr| *rr >= self.config.min_rr_ms && *rr <= self.config.max_rr_ms)
            .collect();

        if valid.len() < 2 {
            return BpmEstimate::default();
        }

        // Recency-weighted mean: newest interval weighs most
        let mut weighted_sum = 0.0f32;
        let mut weight_total = 0.0f32;
        for (i, rr) in valid.iter().enumerate() {
            let w = (i + 1) as f32;
            weighted_sum += rr * w;
            weight_total += w;
        }
        let avg_rr = weighted_sum / weight_total;

        let raw_bpm = (60_000.0 / avg_rr)
            .clamp(self.config.min_bpm as f32, self.config.max_bpm as f32);

        let a = self.config.smoothing_alpha;
        let smoothed = match self.smoothed_bpm {
            Some(prev) => prev * (1.0 - a) + raw_bpm * a,
            None => raw_bpm,
        };
        self.smoothed_bpm = Some(smoothed);

        let bpm = smoothed
            .round()
            .clamp(self.config.min_bpm as f32, self.config.max_bpm as f32) as u16;

        BpmEstimate {
            bpm,
            confidence: self.confidence(&valid),
        }
    }

    /// Time-domain HRV metrics over the stored intervals; None below three
    /// intervals.
    pub fn hrv_metrics(&self) -> Option<HrvMetrics> {
        let n = self.intervals.len();
        if n < 3 {
            return None;
        }

        let mean_ibi = self.intervals.iter().sum::<f32>() / n as f32;
        let var = self
            .intervals
            .iter()
            .map(|x| (x - mean_ibi).powi(2))
            .sum::<f32>()
            / n as f32;
        let sdnn = var.sqrt();

        let mut diffsq_sum = 0.0f32;
        let mut pairs = 0usize;
        let mut prev: Option<f32> = None;
        for &rr in &self.intervals {
            if let Some(p) = prev {
                let d = rr - p;
                diffsq_sum += d * d;
                pairs += 1;
            }
            prev = Some(rr);
        }
        let rmssd = if pairs > 0 {
            (diffsq_sum / pairs as f32).sqrt()
        } else {
            0.0
        };

        Some(HrvMetrics {
            mean_ibi_ms: mean_ibi,
            sdnn_ms: sdnn,
            rmssd_ms: rmssd,
        })
    }

    /// Clear intervals and smoothing (keeps config)
    pub fn reset(&mut self) {
        self.intervals.clear();
        self.smoothed_bpm = None;
    }

    fn confidence(&self, valid: &[f32]) -> f32 {
        let n = valid.len() as f32;
        let mean = valid.iter().sum::<f32>() / n;
        if mean <= 0.0 {
            return 0.0;
        }
        let var = valid.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
        let cv = var.sqrt() / mean;
        ((1.0 - cv / self.config.max_cv).clamp(0.0, 1.0)) * 100.0
    }
}

impl Default for HeartRateAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_below_two_intervals() {
        let mut agg = HeartRateAggregator::new();
        assert_eq!(agg.compute().bpm, 0);
        agg.push_interval(1000.0);
        assert_eq!(agg.compute().bpm, 0);
    }

    #[test]
    fn test_one_second_intervals_give_60() {
        let mut agg = HeartRateAggregator::new();
        for _ in 0..10 {
            agg.push_interval(1000.0);
        }
        let estimate = agg.compute();
        assert_eq!(estimate.bpm, 60);
        assert!(estimate.confidence > 95.0);
    }

    #[test]
    fn test_out_of_band_discarded() {
        let mut agg = HeartRateAggregator::new();
        assert!(!agg.push_interval(100.0));
        assert!(!agg.push_interval(2500.0));
        assert!(!agg.push_interval(f32::NAN));
        assert_eq!(agg.interval_count(), 0);
    }

    #[test]
    fn test_buffer_bounded() {
        let mut agg = HeartRateAggregator::new();
        for _ in 0..50 {
            agg.push_interval(800.0);
        }
        assert_eq!(agg.interval_count(), HeartRateConfig::default().max_intervals);
    }

    #[test]
    fn test_confidence_falls_with_spread() {
        let mut steady = HeartRateAggregator::new();
        for _ in 0..10 {
            steady.push_interval(800.0);
        }

        let mut jittery = HeartRateAggregator::new();
        for i in 0..10 {
            jittery.push_interval(if i % 2 == 0 { 600.0 } else { 1000.0 });
        }

        assert!(steady.compute().confidence > jittery.compute().confidence);
    }

    #[test]
    fn test_smoothing_damps_jumps() {
        let mut agg = HeartRateAggregator::new();
        for _ in 0..10 {
            agg.push_interval(1000.0);
        }
        let before = agg.compute().bpm;
        assert_eq!(before, 60);

        // A run of much faster beats moves the estimate gradually
        for _ in 0..3 {
            agg.push_interval(500.0);
        }
        let after = agg.compute().bpm;
        assert!(after > before);
        assert!(after < 100, "smoothing should damp the jump, got {after}");
    }

    #[test]
    fn test_hrv_metrics_known_values() {
        let mut agg = HeartRateAggregator::new();
        for rr in [800.0, 810.0, 790.0, 805.0] {
            agg.push_interval(rr);
        }
        let hrv = agg.hrv_metrics().unwrap();
        assert!((hrv.mean_ibi_ms - 801.25).abs() < 0.1);
        assert!(hrv.rmssd_ms > 0.0 && hrv.rmssd_ms < 30.0);
        assert!(hrv.sdnn_ms > 0.0 && hrv.sdnn_ms < 20.0);
    }

    #[test]
    fn test_reset_idempotent() {
        let mut agg = HeartRateAggregator::new();
        for _ in 0..5 {
            agg.push_interval(900.0);
        }
        agg.compute();
        agg.reset();
        let once = (agg.interval_count(), agg.compute().bpm);
        agg.reset();
        let twice = (agg.interval_count(), agg.compute().bpm);
        assert_eq!(once, twice);
        assert_eq!(once, (0, 0));
    }
}
