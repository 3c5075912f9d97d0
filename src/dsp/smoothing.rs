//! Sample smoothing for raw PPG intensities
//!
//! A short moving average absorbs sensor noise, optionally followed by a
//! small median stage that rejects single-sample spikes (camera exposure
//! glitches, dropped frames).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Smoothing filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Moving average window in samples (3-15)
    pub window: usize,
    /// Apply a median stage after the moving average
    pub use_median: bool,
    /// Median window in samples (3-5, odd)
    pub median_window: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 5,
            use_median: true,
            median_window: 3,
        }
    }
}

/// Moving-average + median smoothing filter
pub struct SmoothingFilter {
    config: SmoothingConfig,
    history: VecDeque<f32>,
    median_history: VecDeque<f32>,
}

impl SmoothingFilter {
    /// Create with default config
    pub fn new() -> Self {
        Self::with_config(SmoothingConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: SmoothingConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.window),
            median_history: VecDeque::with_capacity(config.median_window),
            config,
        }
    }

    /// Smooth one raw sample.
    ///
    /// Until the window has filled, the raw value passes through unchanged so
    /// the first frames of a session are usable immediately.
    pub fn filter(&mut self, raw: f32) -> f32 {
        self.history.push_back(raw);
        while self.history.len() > self.config.window {
            self.history.pop_front();
        }

        if self.history.len() < self.config.window {
            return raw;
        }

        let avg = self.history.iter().sum::<f32>() / self.history.len() as f32;

        if !self.config.use_median {
            return avg;
        }

        self.median_history.push_back(avg);
        while self.median_history.len() > self.config.median_window {
            self.median_history.pop_front();
        }

        if self.median_history.len() < self.config.median_window {
            return avg;
        }

        let mut sorted: Vec<f32> = self.median_history.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted[sorted.len() / 2]
    }

    /// Reset internal state (keeps config)
    pub fn reset(&mut self) {
        self.history.clear();
        self.median_history.clear();
    }
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self::new()
    }
}
