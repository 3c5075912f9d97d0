//! Finger-presence gating
//!
//! A PPG stream is only meaningful while a fingertip actually covers the
//! camera, so everything downstream is gated on this state machine. Acquiring
//! `Present` requires a short run of qualifying frames; releasing back to
//! `Absent` requires a longer run of disqualifying frames, so a brief dip in
//! quality does not flicker the state. A hard signal-lost floor clears the
//! rolling quality history immediately without short-circuiting the release
//! run.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Finger gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerGateConfig {
    /// Quality needed for a frame to count toward acquisition
    pub quality_on: f32,
    /// Quality under which a frame counts toward release
    pub quality_off: f32,
    /// Quality under which the rolling history is cleared at once
    pub hard_floor: f32,
    /// Minimum red/green ratio for tissue plausibility, when green is known
    pub min_red_green_ratio: f32,
    /// Consecutive qualifying frames to flip Absent -> Present
    pub required_on_frames: u32,
    /// Consecutive disqualifying frames to flip Present -> Absent
    pub required_off_frames: u32,
    /// Rolling window for the displayed quality (frames)
    pub display_window: usize,
}

impl Default for FingerGateConfig {
    fn default() -> Self {
        Self {
            quality_on: 55.0,
            quality_off: 40.0,
            hard_floor: 10.0,
            min_red_green_ratio: 1.2,
            required_on_frames: 3,
            required_off_frames: 8, // release slower than acquire
            display_window: 10,
        }
    }
}

/// Finger presence state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerState {
    Absent,
    Present,
}

/// Qualitative level for UI consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalLevel {
    Excellent,
    Good,
    Weak,
    NoSignal,
}

impl SignalLevel {
    /// Short guidance string for the measurement screen
    pub fn help_message(&self) -> &'static str {
        match self {
            Self::Excellent => "Signal is strong, hold still",
            Self::Good => "Signal is usable, keep the finger steady",
            Self::Weak => "Press the finger flat over camera and flash",
            Self::NoSignal => "Place a fingertip over the camera",
        }
    }
}

/// Per-frame gate output
#[derive(Debug, Clone, Copy)]
pub struct FingerStatus {
    pub state: FingerState,
    /// Convenience flag, true when state is Present
    pub detected: bool,
    /// Rolling-average quality for display
    pub displayed_quality: f32,
    pub level: SignalLevel,
    /// Frames spent in the current state
    pub frames_in_state: u32,
}

/// Hysteresis state machine deciding finger presence
pub struct FingerGate {
    config: FingerGateConfig,
    state: FingerState,
    good_frames: u32,
    bad_frames: u32,
    frames_in_state: u32,
    history: VecDeque<f32>,
}

impl FingerGate {
    /// Create with default config
    pub fn new() -> Self {
        Self::with_config(FingerGateConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: FingerGateConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.display_window),
            config,
            state: FingerState::Absent,
            good_frames: 0,
            bad_frames: 0,
            frames_in_state: 0,
        }
    }

    /// Feed one frame's quality score and optional red/green ratio.
    pub fn update(&mut self, quality: f32, red_green_ratio: Option<f32>) -> FingerStatus {
        let ratio_ok = red_green_ratio
            .map(|r| r >= self.config.min_red_green_ratio)
            .unwrap_or(true);

        if quality < self.config.hard_floor {
            // Fast failure: drop the display history, the state machine
            // still has to walk its release run
            self.history.clear();
        }

        self.history.push_back(quality.clamp(0.0, 100.0));
        while self.history.len() > self.config.display_window {
            self.history.pop_front();
        }

        let qualifies = quality >= self.config.quality_on && ratio_ok;
        let disqualifies = quality < self.config.quality_off || !ratio_ok;

        match self.state {
            FingerState::Absent => {
                if qualifies {
                    self.good_frames += 1;
                    if self.good_frames >= self.config.required_on_frames {
                        self.transition(FingerState::Present);
                    }
                } else {
                    self.good_frames = 0;
                }
            }
            FingerState::Present => {
                if disqualifies {
                    self.bad_frames += 1;
                    if self.bad_frames >= self.config.required_off_frames {
                        self.transition(FingerState::Absent);
                    }
                } else {
                    self.bad_frames = 0;
                }
            }
        }
        self.frames_in_state += 1;

        let displayed_quality = self.displayed_quality();
        FingerStatus {
            state: self.state,
            detected: self.state == FingerState::Present,
            displayed_quality,
            level: self.level(displayed_quality),
            frames_in_state: self.frames_in_state,
        }
    }

    /// Current state without feeding a frame
    pub fn state(&self) -> FingerState {
        self.state
    }

    /// Rolling-average quality for display
    pub fn displayed_quality(&self) -> f32 {
        if self.history.is_empty() {
            0.0
        } else {
            self.history.iter().sum::<f32>() / self.history.len() as f32
        }
    }

    /// Reset to Absent (keeps config)
    pub fn reset(&mut self) {
        self.state = FingerState::Absent;
        self.good_frames = 0;
        self.bad_frames = 0;
        self.frames_in_state = 0;
        self.history.clear();
    }

    fn transition(&mut self, next: FingerState) {
        log::debug!("finger gate: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.good_frames = 0;
        self.bad_frames = 0;
        self.frames_in_state = 0;
    }

    fn level(&self, displayed: f32) -> SignalLevel {
        if self.state == FingerState::Absent {
            return SignalLevel::NoSignal;
        }
        if displayed >= 75.0 {
            SignalLevel::Excellent
        } else if displayed >= self.config.quality_on {
            SignalLevel::Good
        } else {
            SignalLevel::Weak
        }
    }
}

impl Default for FingerGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_absent() {
        let gate = FingerGate::new();
        assert_eq!(gate.state(), FingerState::Absent);
    }

    #[test]
    fn test_flips_after_exact_frame_count() {
        let mut gate = FingerGate::new();
        let required = FingerGateConfig::default().required_on_frames;

        for i in 1..required {
            let status = gate.update(80.0, Some(1.3));
            assert_eq!(status.state, FingerState::Absent, "flipped early at frame {i}");
        }
        let status = gate.update(80.0, Some(1.3));
        assert_eq!(status.state, FingerState::Present);
    }

    #[test]
    fn test_single_bad_frame_does_not_release() {
        let mut gate = FingerGate::new();
        for _ in 0..5 {
            gate.update(80.0, Some(1.3));
        }
        assert_eq!(gate.state(), FingerState::Present);

        gate.update(5.0, Some(1.3));
        assert_eq!(gate.state(), FingerState::Present, "one dip must not release");

        // Recovery clears the release run
        for _ in 0..20 {
            gate.update(80.0, Some(1.3));
        }
        assert_eq!(gate.state(), FingerState::Present);
    }

    #[test]
    fn test_release_needs_longer_run_than_acquire() {
        let config = FingerGateConfig::default();
        let mut gate = FingerGate::with_config(config.clone());
        for _ in 0..config.required_on_frames {
            gate.update(80.0, Some(1.3));
        }
        assert_eq!(gate.state(), FingerState::Present);

        for i in 1..config.required_off_frames {
            gate.update(20.0, Some(1.3));
            assert_eq!(gate.state(), FingerState::Present, "released early at frame {i}");
        }
        gate.update(20.0, Some(1.3));
        assert_eq!(gate.state(), FingerState::Absent);
        assert!(config.required_off_frames > config.required_on_frames);
    }

    #[test]
    fn test_color_ratio_blocks_acquisition() {
        let mut gate = FingerGate::new();
        // High quality but implausible tissue color (e.g. white paper)
        for _ in 0..10 {
            gate.update(90.0, Some(1.0));
        }
        assert_eq!(gate.state(), FingerState::Absent);
    }

    #[test]
    fn test_missing_ratio_is_permissive() {
        let mut gate = FingerGate::new();
        for _ in 0..5 {
            gate.update(90.0, None);
        }
        assert_eq!(gate.state(), FingerState::Present);
    }

    #[test]
    fn test_hard_floor_clears_history() {
        let mut gate = FingerGate::new();
        for _ in 0..10 {
            gate.update(90.0, Some(1.3));
        }
        assert!(gate.displayed_quality() > 80.0);

        let status = gate.update(2.0, Some(1.3));
        // Only the signal-lost frame remains in the display history
        assert!(status.displayed_quality < 10.0);
        assert_eq!(status.state, FingerState::Present);
    }

    #[test]
    fn test_mid_quality_is_neither_acquire_nor_release() {
        let mut gate = FingerGate::new();
        for _ in 0..5 {
            gate.update(80.0, Some(1.3));
        }
        // Between quality_off and quality_on: holds state indefinitely
        for _ in 0..50 {
            gate.update(45.0, Some(1.3));
        }
        assert_eq!(gate.state(), FingerState::Present);
    }

    #[test]
    fn test_reset() {
        let mut gate = FingerGate::new();
        for _ in 0..5 {
            gate.update(80.0, Some(1.3));
        }
        gate.reset();
        assert_eq!(gate.state(), FingerState::Absent);
        assert_eq!(gate.displayed_quality(), 0.0);
    }
}
