//! # ppg-signals
//!
//! Fingertip photoplethysmography (PPG) signal processing.
//!
//! This crate takes the per-frame red-channel intensity of a fingertip
//! pressed against a smartphone camera and turns it into gated vital-sign
//! primitives:
//! - **Finger-presence gating**: a hysteresis state machine that suppresses
//!   every downstream output until a fingertip demonstrably covers the lens
//! - **Heart rate and RR intervals**: peak-based extraction with a
//!   frequency-domain cross-check
//! - **Rhythm heuristics**: debounced irregularity events over the RR stream
//!
//! Frame acquisition and region-of-interest pixel extraction are external;
//! the input boundary is one `(timestamp, intensity)` sample per frame.
//!
//! ## Example
//!
//! ```ignore
//! use ppg_signals::{PpgProcessor, PpgSample};
//!
//! let mut processor = PpgProcessor::new();
//!
//! for frame in camera_frames {
//!     let output = processor.process(PpgSample::with_green(
//!         frame.timestamp_ms,
//!         frame.red_mean,
//!         frame.green_mean,
//!     ));
//!     if output.finger_detected {
//!         println!("{} BPM (confidence {:.0})", output.bpm, output.confidence);
//!     }
//! }
//! ```

pub mod config;
pub mod dsp;
pub mod finger;
pub mod physio;
pub mod pipeline;

#[cfg(test)]
mod tests_proptest;

pub use config::{ConfigError, ProcessorConfig};
pub use dsp::{QualityReport, SignalQualityEstimator};
pub use finger::{FingerGate, FingerState, SignalLevel};
pub use physio::{ArrhythmiaDetector, ArrhythmiaStatus, HeartRateAggregator};
pub use pipeline::{FrameOutput, PpgProcessor, PpgSample};
