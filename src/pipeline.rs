//! Frame-driven PPG processing pipeline
//!
//! Orchestrates one measurement session: smoothing, baseline removal, quality
//! scoring, finger gating, peak detection, heart-rate aggregation, and the
//! rhythm heuristic. One call to [`PpgProcessor::process`] handles exactly one
//! camera frame; the pipeline is single threaded and non-reentrant, all state
//! belongs to the processor instance.
//!
//! While no finger covers the camera every vital output reports its explicit
//! no-data sentinel. A panic anywhere in the DSP layer is caught at this
//! boundary, logged, and converted into a repeat of the last valid output with
//! zeroed confidence, so frame delivery never crashes.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};

use ndarray::Array1;

use crate::config::ProcessorConfig;
use crate::dsp::{
    BaselineTracker, FilteredSample, PeakDetector, SignalQualityEstimator, SmoothingFilter,
    SpectralAnalyzer,
};
use crate::finger::{FingerGate, SignalLevel};
use crate::physio::{ArrhythmiaDetector, ArrhythmiaStatus, HeartRateAggregator};

/// One raw camera frame reading
#[derive(Debug, Clone, Copy)]
pub struct PpgSample {
    /// Frame timestamp (ms)
    pub timestamp_ms: i64,
    /// Red-channel (or luminance) intensity from the ROI selector
    pub intensity: f32,
    /// Green-channel intensity, when the camera provides it
    pub green: Option<f32>,
}

impl PpgSample {
    pub fn new(timestamp_ms: i64, intensity: f32) -> Self {
        Self {
            timestamp_ms,
            intensity,
            green: None,
        }
    }

    pub fn with_green(timestamp_ms: i64, intensity: f32, green: f32) -> Self {
        Self {
            timestamp_ms,
            intensity,
            green: Some(green),
        }
    }
}

/// Per-frame pipeline output
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// Timestamp of the frame that produced this output (ms)
    pub timestamp_ms: i64,
    /// Smoothed, AC-centered sample value
    pub filtered_value: f32,
    /// Displayed signal quality (0-100)
    pub quality: f32,
    pub finger_detected: bool,
    pub signal_level: SignalLevel,
    /// Beats per minute; 0 while no estimate exists
    pub bpm: u16,
    /// Estimate confidence (0-100)
    pub confidence: f32,
    /// Current RR buffer, oldest first; empty while no finger
    pub rr_intervals_ms: Vec<f32>,
    pub arrhythmia_status: ArrhythmiaStatus,
    /// Irregularity events registered this session
    pub arrhythmia_counter: u32,
    /// AC/DC ratio, a proxy for pulse strength
    pub perfusion_index: f32,
    /// Frequency-domain BPM cross-check, when the window is full
    pub spectral_bpm: Option<f32>,
}

impl Default for FrameOutput {
    fn default() -> Self {
        Self {
            timestamp_ms: 0,
            filtered_value: 0.0,
            quality: 0.0,
            finger_detected: false,
            signal_level: SignalLevel::NoSignal,
            bpm: 0,
            confidence: 0.0,
            rr_intervals_ms: Vec::new(),
            arrhythmia_status: ArrhythmiaStatus::Calibrating,
            arrhythmia_counter: 0,
            perfusion_index: 0.0,
            spectral_bpm: None,
        }
    }
}

/// One-session PPG processor
pub struct PpgProcessor {
    config: ProcessorConfig,

    smoothing: SmoothingFilter,
    baseline: BaselineTracker,
    quality: SignalQualityEstimator,
    spectral: SpectralAnalyzer,
    peaks: PeakDetector,
    gate: FingerGate,
    heart_rate: HeartRateAggregator,
    arrhythmia: ArrhythmiaDetector,

    /// Analysis window of processed samples
    buffer: VecDeque<FilteredSample>,
    /// Timestamp of the last accepted peak, for incremental RR extraction
    prev_peak_ms: Option<i64>,
    /// Peaks at or before this moment are ignored; advanced while the finger
    /// is absent so a regained finger does not replay pre-loss beats
    beat_floor_ms: i64,
    running: bool,
    frame_count: usize,
    last_valid: Option<FrameOutput>,
}

impl PpgProcessor {
    /// Create a running processor with default config
    pub fn new() -> Self {
        Self::with_config(ProcessorConfig::default())
    }

    /// Create a running processor with custom config
    pub fn with_config(config: ProcessorConfig) -> Self {
        Self {
            smoothing: SmoothingFilter::with_config(config.smoothing.clone()),
            baseline: BaselineTracker::with_config(config.baseline.clone()),
            quality: SignalQualityEstimator::with_config(config.quality.clone()),
            spectral: SpectralAnalyzer::with_config(config.spectral.clone()),
            peaks: PeakDetector::with_config(config.peaks.clone()),
            gate: FingerGate::with_config(config.finger.clone()),
            heart_rate: HeartRateAggregator::with_config(config.heart_rate.clone()),
            arrhythmia: ArrhythmiaDetector::with_config(config.arrhythmia.clone()),
            buffer: VecDeque::with_capacity(config.buffer_len),
            config,
            prev_peak_ms: None,
            beat_floor_ms: 0,
            running: true,
            frame_count: 0,
            last_valid: None,
        }
    }

    /// Process one camera frame.
    ///
    /// After [`stop`](Self::stop) this returns the retained last valid output
    /// without mutating any state.
    pub fn process(&mut self, sample: PpgSample) -> FrameOutput {
        if !self.running {
            return self.last_output();
        }

        if !sample.intensity.is_finite() {
            log::warn!("discarding non-finite intensity at {} ms", sample.timestamp_ms);
            return self.last_output();
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| self.process_frame(sample)));
        match outcome {
            Ok(output) => {
                self.last_valid = Some(output.clone());
                output
            }
            Err(_) => {
                log::error!("frame processing panicked, emitting previous result");
                let mut output = self.last_output();
                output.confidence = 0.0;
                output
            }
        }
    }

    /// Resume sample intake after a stop
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Halt sample intake; the last valid output stays available
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Clear all buffers and counters, keep config and the retained result
    pub fn reset(&mut self) {
        self.smoothing.reset();
        self.baseline.reset();
        self.quality.reset();
        self.gate.reset();
        self.heart_rate.reset();
        self.arrhythmia.reset();
        self.buffer.clear();
        self.prev_peak_ms = None;
        self.beat_floor_ms = 0;
        self.frame_count = 0;
    }

    /// Reset and also discard the retained last valid output
    pub fn full_reset(&mut self) {
        self.reset();
        self.last_valid = None;
    }

    /// Retained output of the most recent successfully processed frame
    pub fn last_output(&self) -> FrameOutput {
        self.last_valid.clone().unwrap_or_default()
    }

    /// Frames processed this session
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Active configuration
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn process_frame(&mut self, sample: PpgSample) -> FrameOutput {
        self.frame_count += 1;

        let smoothed = self.smoothing.filter(sample.intensity);
        let ac = self.baseline.update(smoothed);

        self.buffer.push_back(FilteredSample {
            raw: sample.intensity,
            filtered: ac,
            timestamp_ms: sample.timestamp_ms,
        });
        while self.buffer.len() > self.config.buffer_len {
            self.buffer.pop_front();
        }

        let window_vals: Vec<f32> = {
            let start = self.buffer.len().saturating_sub(self.config.quality.window);
            self.buffer.iter().skip(start).map(|s| s.filtered).collect()
        };
        let report = self.quality.score(&window_vals);

        let color_ratio = sample
            .green
            .and_then(|g| (g > 1e-3).then(|| sample.intensity / g));
        let gate_status = self.gate.update(report.score, color_ratio);

        let perfusion_index = match self.baseline.baseline() {
            Some(dc) if dc.abs() > 1e-3 => report.peak_to_peak / dc.abs(),
            _ => 0.0,
        };

        if !gate_status.detected {
            // Beat state must not survive a lifted finger; the rhythm
            // detector keeps its session counters and decays its debounce
            if self.prev_peak_ms.is_some() || self.heart_rate.interval_count() > 0 {
                self.heart_rate.reset();
                self.prev_peak_ms = None;
            }
            self.beat_floor_ms = sample.timestamp_ms;
            let assessment =
                self.arrhythmia
                    .update(sample.timestamp_ms, &[], None, false, false);

            return FrameOutput {
                timestamp_ms: sample.timestamp_ms,
                filtered_value: ac,
                quality: gate_status.displayed_quality,
                finger_detected: false,
                signal_level: gate_status.level,
                bpm: 0,
                confidence: 0.0,
                rr_intervals_ms: Vec::new(),
                arrhythmia_status: assessment.status,
                arrhythmia_counter: assessment.event_count,
                perfusion_index: 0.0,
                spectral_bpm: None,
            };
        }

        // Peak detection over the full analysis window
        let analysis = {
            let window: &[FilteredSample] = self.buffer.make_contiguous();
            self.peaks.detect(window)
        };

        // Only peaks newer than the last accepted one extend the RR buffer
        let mut new_beat = false;
        for peak in &analysis.peaks {
            if peak.timestamp_ms <= self.beat_floor_ms {
                continue;
            }
            match self.prev_peak_ms {
                Some(prev) if peak.timestamp_ms <= prev => continue,
                Some(prev) => {
                    let rr = (peak.timestamp_ms - prev) as f32;
                    if self.heart_rate.push_interval(rr) {
                        new_beat = true;
                    }
                    self.prev_peak_ms = Some(peak.timestamp_ms);
                }
                None => {
                    self.prev_peak_ms = Some(peak.timestamp_ms);
                }
            }
        }

        let estimate = self.heart_rate.compute();
        let hrv = self.heart_rate.hrv_metrics();
        let rr_intervals_ms: Vec<f32> = self.heart_rate.intervals().collect();

        let signal_ok = report.score >= self.config.finger.quality_off;
        let assessment = self.arrhythmia.update(
            sample.timestamp_ms,
            &rr_intervals_ms,
            hrv.as_ref(),
            new_beat,
            signal_ok,
        );

        let spectral_bpm = if window_vals.len() >= self.config.quality.window {
            let arr = Array1::from(window_vals);
            let peak = self.spectral.peak_frequency(&arr);
            (peak.bpm > 0.0).then_some(peak.bpm)
        } else {
            None
        };

        // Agreement between the time-domain and spectral estimates earns a
        // confidence boost, disagreement leaves the base confidence alone
        let mut confidence = estimate.confidence;
        if estimate.bpm > 0 {
            if let Some(sb) = spectral_bpm {
                if (sb - estimate.bpm as f32).abs() <= self.config.spectral_agreement_bpm {
                    confidence = (confidence * 1.15).min(100.0);
                }
            }
        }

        FrameOutput {
            timestamp_ms: sample.timestamp_ms,
            filtered_value: ac,
            quality: gate_status.displayed_quality,
            finger_detected: true,
            signal_level: gate_status.level,
            bpm: estimate.bpm,
            confidence,
            rr_intervals_ms,
            arrhythmia_status: assessment.status,
            arrhythmia_counter: assessment.event_count,
            perfusion_index,
            spectral_bpm,
        }
    }
}

impl Default for PpgProcessor {
    fn default() -> Self {
        Self::new()
    }
}
