//! Adaptive baseline tracking
//!
//! Maintains the slowly varying DC component of the PPG stream with an
//! exponential average whose rate adapts to recent variance: a moving finger
//! or lighting change is tracked faster, a steady signal is tracked slowly so
//! the pulsatile AC component is preserved. Output is the AC-centered value
//! `raw - baseline`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Baseline tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Slowest tracking alpha
    pub min_alpha: f32,
    /// Fastest tracking alpha
    pub max_alpha: f32,
    /// Cap on the variance-driven alpha multiplier
    pub variance_multiplier_cap: f32,
    /// Window for recent-variance estimation (samples)
    pub variance_window: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            min_alpha: 0.02,
            max_alpha: 0.08,
            variance_multiplier_cap: 3.0,
            variance_window: 30, // 1 sec at 30 fps
        }
    }
}

/// Adaptive EMA baseline tracker
pub struct BaselineTracker {
    config: BaselineConfig,
    baseline: Option<f32>,
    recent: VecDeque<f32>,
}

impl BaselineTracker {
    /// Create with default config
    pub fn new() -> Self {
        Self::with_config(BaselineConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: BaselineConfig) -> Self {
        Self {
            recent: VecDeque::with_capacity(config.variance_window),
            config,
            baseline: None,
        }
    }

    /// Update the baseline with a new raw sample and return the AC-centered
    /// value `raw - baseline`.
    ///
    /// The first sample initializes the baseline exactly, so there is no
    /// warm-up transient at session start.
    pub fn update(&mut self, raw: f32) -> f32 {
        self.recent.push_back(raw);
        while self.recent.len() > self.config.variance_window {
            self.recent.pop_front();
        }

        let baseline = match self.baseline {
            None => {
                self.baseline = Some(raw);
                raw
            }
            Some(prev) => {
                let alpha = self.adaptive_alpha(prev);
                let next = prev * (1.0 - alpha) + raw * alpha;
                self.baseline = Some(next);
                next
            }
        };

        raw - baseline
    }

    /// Current DC baseline (None before the first sample)
    pub fn baseline(&self) -> Option<f32> {
        self.baseline
    }

    /// Reset internal state (keeps config)
    pub fn reset(&mut self) {
        self.baseline = None;
        self.recent.clear();
    }

    fn adaptive_alpha(&self, baseline: f32) -> f32 {
        let n = self.recent.len();
        if n < 2 {
            return self.config.min_alpha;
        }

        let mean = self.recent.iter().sum::<f32>() / n as f32;
        let var = self.recent.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n as f32;
        let std = var.sqrt();

        // Relative deviation against the DC level drives the multiplier
        let rel = std / baseline.abs().max(1e-3);
        let multiplier = (1.0 + rel * 20.0).min(self.config.variance_multiplier_cap);

        (self.config.min_alpha * multiplier).min(self.config.max_alpha)
    }
}

impl Default for BaselineTracker {
    fn default() -> Self {
        Self::new()
    }
}
