//! Composite signal-quality scoring
//!
//! Combines four independently normalized sub-scores into a single 0-100
//! quality value: peak-to-peak amplitude (penalizing both a too-weak signal
//! and motion-sized swings), dispersion stability, autocorrelation
//! periodicity inside the plausible heart-rate band, and derivative
//! pulsatility. The combined score is smoothed with an exponential blend so
//! the finger gate downstream is not fed frame-to-frame jitter.

use serde::{Deserialize, Serialize};

/// Quality estimator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Analysis window length (samples)
    pub window: usize,
    /// Below this many samples the score is 0 (insufficient data)
    pub min_samples: usize,

    /// Sub-score weights; must sum to 1
    pub amplitude_weight: f32,
    pub stability_weight: f32,
    pub periodicity_weight: f32,
    pub pulsatility_weight: f32,

    /// Peak-to-peak band (AC units): rises from `min_peak_to_peak`, flat
    /// between the ideal bounds, falls to 0 at `max_peak_to_peak`
    pub min_peak_to_peak: f32,
    pub ideal_low_pp: f32,
    pub ideal_high_pp: f32,
    pub max_peak_to_peak: f32,

    /// Dispersion ratio (std over mean absolute value) band
    pub cv_floor: f32,
    pub cv_ideal_low: f32,
    pub cv_ideal_high: f32,
    pub cv_ceiling: f32,

    /// Heart-rate band for the autocorrelation lag search
    pub min_bpm: f32,
    pub max_bpm: f32,

    /// Derivative sign-change ratio band
    pub pulsatility_floor: f32,
    pub pulsatility_ideal_low: f32,
    pub pulsatility_ideal_high: f32,
    pub pulsatility_ceiling: f32,

    /// Exponential blend toward the new score (0-1)
    pub smoothing_alpha: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            window: 90, // 3 sec at 30 fps
            min_samples: 30,
            amplitude_weight: 0.35,
            stability_weight: 0.25,
            periodicity_weight: 0.20,
            pulsatility_weight: 0.20,
            min_peak_to_peak: 1.0,
            ideal_low_pp: 4.0,
            ideal_high_pp: 40.0,
            max_peak_to_peak: 80.0,
            cv_floor: 0.2,
            cv_ideal_low: 0.5,
            cv_ideal_high: 2.5,
            cv_ceiling: 4.0,
            min_bpm: 40.0,
            max_bpm: 180.0,
            pulsatility_floor: 0.01,
            pulsatility_ideal_low: 0.04,
            pulsatility_ideal_high: 0.30,
            pulsatility_ceiling: 0.60,
            smoothing_alpha: 0.3,
        }
    }
}

/// Per-window quality breakdown
#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    /// Smoothed composite score (0-100), the value consumers should gate on
    pub score: f32,
    /// Unsmoothed composite score for this window
    pub raw_score: f32,
    pub amplitude_score: f32,
    pub stability_score: f32,
    pub periodicity_score: f32,
    pub pulsatility_score: f32,
    /// Peak-to-peak range of the analyzed window (AC units)
    pub peak_to_peak: f32,
}

/// Composite signal-quality estimator
pub struct SignalQualityEstimator {
    config: QualityConfig,
    smoothed: Option<f32>,
}

impl SignalQualityEstimator {
    /// Create with default config
    pub fn new() -> Self {
        Self::with_config(QualityConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: QualityConfig) -> Self {
        Self {
            config,
            smoothed: None,
        }
    }

    /// Score one window of AC-centered samples.
    pub fn score(&mut self, window: &[f32]) -> QualityReport {
        if window.len() < self.config.min_samples {
            let score = self.smooth(0.0);
            return QualityReport {
                score,
                ..QualityReport::default()
            };
        }

        let n = window.len() as f32;
        let mean = window.iter().sum::<f32>() / n;
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut var = 0.0f32;
        let mut mean_abs = 0.0f32;
        for &x in window {
            min = min.min(x);
            max = max.max(x);
            var += (x - mean).powi(2);
            mean_abs += (x - mean).abs();
        }
        var /= n;
        mean_abs /= n;
        let std = var.sqrt();
        let peak_to_peak = max - min;

        let c = &self.config;

        let amplitude_score = trapezoid(
            peak_to_peak,
            c.min_peak_to_peak,
            c.ideal_low_pp,
            c.ideal_high_pp,
            c.max_peak_to_peak,
        );

        let cv = if mean_abs > 1e-6 { std / mean_abs } else { 0.0 };
        let stability_score = trapezoid(cv, c.cv_floor, c.cv_ideal_low, c.cv_ideal_high, c.cv_ceiling);

        let periodicity_score = self.periodicity(window, mean);

        let pulsatility_score = {
            let ratio = sign_change_ratio(window);
            trapezoid(
                ratio,
                c.pulsatility_floor,
                c.pulsatility_ideal_low,
                c.pulsatility_ideal_high,
                c.pulsatility_ceiling,
            )
        };

        let raw_score = (c.amplitude_weight * amplitude_score
            + c.stability_weight * stability_score
            + c.periodicity_weight * periodicity_score
            + c.pulsatility_weight * pulsatility_score)
            .clamp(0.0, 100.0);

        let score = self.smooth(raw_score);

        QualityReport {
            score,
            raw_score,
            amplitude_score,
            stability_score,
            periodicity_score,
            pulsatility_score,
            peak_to_peak,
        }
    }

    /// Last smoothed score without recomputing
    pub fn current(&self) -> f32 {
        self.smoothed.unwrap_or(0.0)
    }

    /// Reset internal state (keeps config)
    pub fn reset(&mut self) {
        self.smoothed = None;
    }

    fn smooth(&mut self, raw: f32) -> f32 {
        let a = self.config.smoothing_alpha;
        let next = match self.smoothed {
            Some(prev) => prev * (1.0 - a) + raw * a,
            None => raw,
        };
        self.smoothed = Some(next);
        next
    }

    /// Best normalized autocorrelation over lags inside the HR band.
    fn periodicity(&self, window: &[f32], mean: f32) -> f32 {
        let n = window.len();
        let fs = self.config.sample_rate;
        let lag_min = ((fs * 60.0 / self.config.max_bpm).round() as usize).max(1);
        let lag_max = ((fs * 60.0 / self.config.min_bpm).round() as usize).min(n / 2);
        if lag_min >= lag_max {
            return 0.0;
        }

        let ac0: f32 = window.iter().map(|x| (x - mean).powi(2)).sum();
        if ac0 < 1e-9 {
            return 0.0;
        }

        let mut best = 0.0f32;
        for lag in lag_min..=lag_max {
            let mut ac = 0.0f32;
            for i in 0..n - lag {
                ac += (window[i] - mean) * (window[i + lag] - mean);
            }
            // Rescale for the shrinking overlap
            let normalized = (ac / ac0) * (n as f32 / (n - lag) as f32);
            if normalized > best {
                best = normalized;
            }
        }

        (best.clamp(0.0, 1.0)) * 100.0
    }
}

impl Default for SignalQualityEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Piecewise-linear band score: 0 outside [rise, fall], 100 on the plateau.
fn trapezoid(x: f32, rise: f32, plateau_lo: f32, plateau_hi: f32, fall: f32) -> f32 {
    if x <= rise || x >= fall {
        0.0
    } else if x < plateau_lo {
        100.0 * (x - rise) / (plateau_lo - rise).max(1e-6)
    } else if x <= plateau_hi {
        100.0
    } else {
        100.0 * (fall - x) / (fall - plateau_hi).max(1e-6)
    }
}

/// Fraction of samples where the first derivative changes sign.
fn sign_change_ratio(window: &[f32]) -> f32 {
    if window.len() < 3 {
        return 0.0;
    }
    let mut changes = 0usize;
    let mut prev_sign = 0i8;
    for pair in window.windows(2) {
        let d = pair[1] - pair[0];
        let sign = if d > 0.0 {
            1
        } else if d < 0.0 {
            -1
        } else {
            0
        };
        if sign != 0 {
            if prev_sign != 0 && sign != prev_sign {
                changes += 1;
            }
            prev_sign = sign;
        }
    }
    changes as f32 / (window.len() - 1) as f32
}
