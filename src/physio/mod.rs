//! Physiological aggregation over the extracted beat stream
//!
//! - `HeartRateAggregator` - RR buffer, BPM with confidence, HRV metrics
//! - `ArrhythmiaDetector` - debounced rhythm-irregularity heuristic

mod arrhythmia;
mod heart_rate;

pub use arrhythmia::{
    ArrhythmiaAssessment, ArrhythmiaConfig, ArrhythmiaDetector, ArrhythmiaStatus,
};
pub use heart_rate::{BpmEstimate, HeartRateAggregator, HeartRateConfig, HrvMetrics};
