//! Band-limited spectral peak estimation
//!
//! FFT of a Hamming-windowed signal, peak picking restricted to a
//! physiological frequency band, SNR against the in-band residual, and
//! parabolic interpolation for sub-bin accuracy. Used as a frequency-domain
//! cross-check on the time-domain (peak-to-peak) heart rate.

use ndarray::Array1;
use num_complex::Complex32;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Spectral analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Minimum frequency of the search band (Hz)
    pub min_freq: f32,
    /// Maximum frequency of the search band (Hz)
    pub max_freq: f32,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            min_freq: 0.67, // 40 BPM
            max_freq: 3.0,  // 180 BPM
        }
    }
}

/// Spectral peak result
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralPeak {
    /// Peak frequency (Hz); 0.0 when no peak was found
    pub freq_hz: f32,
    /// Peak frequency expressed in BPM
    pub bpm: f32,
    /// SNR of the peak against in-band residual power (dB)
    pub snr_db: f32,
}

/// Band-limited FFT peak analyzer
pub struct SpectralAnalyzer {
    config: SpectralConfig,
    fft_planner: FftPlanner<f32>,
}

impl SpectralAnalyzer {
    /// Create with default config
    pub fn new() -> Self {
        Self::with_config(SpectralConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: SpectralConfig) -> Self {
        Self {
            config,
            fft_planner: FftPlanner::new(),
        }
    }

    /// Locate the dominant in-band frequency.
    ///
    /// Signals shorter than 32 samples return a zeroed result.
    pub fn peak_frequency(&mut self, signal: &Array1<f32>) -> SpectralPeak {
        let n = signal.len();
        let fs = self.config.sample_rate;
        if n < 32 || fs <= 0.0 {
            return SpectralPeak::default();
        }

        // Hamming window
        let windowed: Vec<Complex32> = signal
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let w = 0.54 - 0.46 * (2.0 * PI * i as f32 / (n - 1) as f32).cos();
                Complex32::new(s * w, 0.0)
            })
            .collect();

        let fft = self.fft_planner.plan_fft_forward(n);
        let mut buffer = windowed;
        fft.process(&mut buffer);

        let half_n = n / 2;
        let power: Vec<f32> = buffer.iter().take(half_n).map(|c| c.norm_sqr()).collect();

        let bin_res = fs / n as f32;
        let min_bin = (self.config.min_freq / bin_res).max(0.0) as usize;
        let max_bin = (self.config.max_freq / bin_res).min(half_n as f32) as usize;
        if min_bin >= max_bin || max_bin == 0 {
            return SpectralPeak::default();
        }

        let mut peak_bin = min_bin;
        let mut peak_power = 0.0f32;
        let mut total_power = 0.0f32;
        for i in min_bin..=max_bin.min(half_n - 1) {
            let p = power[i];
            total_power += p;
            if p > peak_power {
                peak_power = p;
                peak_bin = i;
            }
        }

        if peak_power <= 0.0 {
            return SpectralPeak::default();
        }

        let noise = (total_power - peak_power).max(1e-12);
        let snr_db = 10.0 * (peak_power / noise).log10();

        // Parabolic interpolation refines the peak to sub-bin accuracy
        let refined_bin = if peak_bin > 0 && peak_bin + 1 < power.len() {
            let y_m1 = power[peak_bin - 1];
            let y_0 = power[peak_bin];
            let y_p1 = power[peak_bin + 1];
            let denom = y_m1 - 2.0 * y_0 + y_p1;
            if denom.abs() > 1e-12 {
                let delta = 0.5 * (y_m1 - y_p1) / denom;
                if delta.is_finite() && delta.abs() <= 1.0 {
                    peak_bin as f32 + delta
                } else {
                    peak_bin as f32
                }
            } else {
                peak_bin as f32
            }
        } else {
            peak_bin as f32
        };

        let freq_hz = refined_bin * bin_res;
        SpectralPeak {
            freq_hz,
            bpm: freq_hz * 60.0,
            snr_db,
        }
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
