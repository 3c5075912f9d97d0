//! DSP building blocks for the fingertip PPG pipeline
//!
//! - `SmoothingFilter` - moving average + median spike rejection
//! - `BaselineTracker` - adaptive EMA baseline, AC centering
//! - `PeakDetector` - local extrema, refractory distance, RR extraction
//! - `SignalQualityEstimator` - composite 0-100 quality score
//! - `SpectralAnalyzer` - band-limited FFT cross-check

mod baseline;
mod peaks;
mod signal_quality;
mod smoothing;
mod spectral;

pub use baseline::{BaselineConfig, BaselineTracker};
pub use peaks::{PeakAnalysis, PeakDetector, PeakDetectorConfig, PeakEvent};
pub use signal_quality::{QualityConfig, QualityReport, SignalQualityEstimator};
pub use smoothing::{SmoothingConfig, SmoothingFilter};
pub use spectral::{SpectralAnalyzer, SpectralConfig, SpectralPeak};

/// One processed sample in the analysis window
#[derive(Debug, Clone, Copy)]
pub struct FilteredSample {
    /// Raw camera intensity
    pub raw: f32,
    /// Smoothed, AC-centered value
    pub filtered: f32,
    /// Frame timestamp (ms)
    pub timestamp_ms: i64,
}
