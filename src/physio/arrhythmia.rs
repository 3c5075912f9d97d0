//! Rhythm-irregularity heuristic
//!
//! Watches the shared RR-interval buffer for premature beats, delayed beats,
//! and elevated RMSSD. A session opens in a learning phase during which only
//! a calibrating status is reported. Individual abnormal beats are debounced
//! through a consecutive counter; an irregularity event is registered only at
//! the confirmation threshold, after a cooldown since the previous event, and
//! under the per-session event cap. Missing or low-quality data decays the
//! counter instead of zeroing it, so the heuristic does not oscillate at the
//! edge of signal loss.

use super::heart_rate::HrvMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arrhythmia heuristic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrhythmiaConfig {
    /// Learning-phase duration from session start (ms)
    pub learning_ms: i64,
    /// A beat under this fraction of the recent mean is premature
    pub premature_ratio: f32,
    /// A beat over this fraction of the recent mean is delayed
    pub delayed_ratio: f32,
    /// RMSSD above this flags the beat as abnormal (ms)
    pub rmssd_threshold_ms: f32,
    /// Consecutive abnormal beats needed to register an event
    pub confirmation_threshold: u32,
    /// Minimum spacing between registered events (ms)
    pub cooldown_ms: i64,
    /// Cap on registered events per session
    pub max_session_events: u32,
    /// How many recent intervals form the comparison mean
    pub mean_window: usize,
    /// RR snapshot length retained around a confirmed event
    pub snapshot_len: usize,
}

impl Default for ArrhythmiaConfig {
    fn default() -> Self {
        Self {
            learning_ms: 8_000,
            premature_ratio: 0.7,
            delayed_ratio: 1.3,
            rmssd_threshold_ms: 80.0,
            confirmation_threshold: 3,
            cooldown_ms: 10_000,
            max_session_events: 5,
            mean_window: 8,
            snapshot_len: 8,
        }
    }
}

/// Reported rhythm status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrhythmiaStatus {
    /// Learning phase, no judgment yet
    Calibrating,
    Normal,
    /// An event was registered within the last cooldown window
    Irregular,
}

impl fmt::Display for ArrhythmiaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Calibrating => "CALIBRATING",
            Self::Normal => "NORMAL",
            Self::Irregular => "IRREGULAR",
        };
        f.write_str(s)
    }
}

/// Per-frame assessment
#[derive(Debug, Clone, Copy)]
pub struct ArrhythmiaAssessment {
    pub status: ArrhythmiaStatus,
    /// Events registered this session
    pub event_count: u32,
    /// Whether the newest beat was classified abnormal
    pub beat_abnormal: bool,
    /// Current debounce counter
    pub consecutive_abnormal: u32,
}

/// Debounced rhythm-irregularity detector
pub struct ArrhythmiaDetector {
    config: ArrhythmiaConfig,
    session_start_ms: Option<i64>,
    consecutive_abnormal: u32,
    last_event_ms: Option<i64>,
    event_count: u32,
    /// RR intervals captured when the last event confirmed
    event_snapshot: Vec<f32>,
}

impl ArrhythmiaDetector {
    /// Create with default config
    pub fn new() -> Self {
        Self::with_config(ArrhythmiaConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: ArrhythmiaConfig) -> Self {
        Self {
            config,
            session_start_ms: None,
            consecutive_abnormal: 0,
            last_event_ms: None,
            event_count: 0,
            event_snapshot: Vec::new(),
        }
    }

    /// Assess the rhythm for this frame.
    ///
    /// `intervals` is the shared RR buffer oldest-first, `new_beat` marks
    /// frames on which a fresh interval was appended, `signal_ok` reflects
    /// the upstream quality gate.
    pub fn update(
        &mut self,
        now_ms: i64,
        intervals: &[f32],
        hrv: Option<&HrvMetrics>,
        new_beat: bool,
        signal_ok: bool,
    ) -> ArrhythmiaAssessment {
        let start = *self.session_start_ms.get_or_insert(now_ms);

        if now_ms - start < self.config.learning_ms {
            return self.assessment(ArrhythmiaStatus::Calibrating, false);
        }

        if !signal_ok || intervals.len() < 3 {
            // Decay, not reset: brief dropouts must not discard evidence
            self.consecutive_abnormal = self.consecutive_abnormal.saturating_sub(1);
            return self.assessment(self.status(now_ms), false);
        }

        if !new_beat {
            return self.assessment(self.status(now_ms), false);
        }

        let beat_abnormal = self.classify_last_beat(intervals, hrv);
        if beat_abnormal {
            self.consecutive_abnormal += 1;
        } else {
            self.consecutive_abnormal = self.consecutive_abnormal.saturating_sub(1);
        }

        if self.consecutive_abnormal >= self.config.confirmation_threshold
            && self.cooldown_elapsed(now_ms)
            && self.event_count < self.config.max_session_events
        {
            self.event_count += 1;
            self.last_event_ms = Some(now_ms);
            self.consecutive_abnormal = 0;
            let tail = intervals.len().saturating_sub(self.config.snapshot_len);
            self.event_snapshot = intervals[tail..].to_vec();
            log::warn!(
                "irregular rhythm event #{} at {} ms",
                self.event_count,
                now_ms
            );
        }

        self.assessment(self.status(now_ms), beat_abnormal)
    }

    /// Events registered this session
    pub fn event_count(&self) -> u32 {
        self.event_count
    }

    /// RR snapshot captured at the last confirmed event
    pub fn event_snapshot(&self) -> &[f32] {
        &self.event_snapshot
    }

    /// Reset session state (keeps config)
    pub fn reset(&mut self) {
        self.session_start_ms = None;
        self.consecutive_abnormal = 0;
        self.last_event_ms = None;
        self.event_count = 0;
        self.event_snapshot.clear();
    }

    fn classify_last_beat(&self, intervals: &[f32], hrv: Option<&HrvMetrics>) -> bool {
        let last = match intervals.last() {
            Some(v) => *v,
            None => return false,
        };

        // Mean of the preceding intervals, newest beat excluded
        let prior = &intervals[..intervals.len() - 1];
        let window = &prior[prior.len().saturating_sub(self.config.mean_window)..];
        if window.is_empty() {
            return false;
        }
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        if mean <= 0.0 {
            return false;
        }

        let premature = last < self.config.premature_ratio * mean;
        let delayed = last > self.config.delayed_ratio * mean;
        let high_rmssd = hrv
            .map(|m| m.rmssd_ms > self.config.rmssd_threshold_ms)
            .unwrap_or(false);

        premature || delayed || high_rmssd
    }

    fn cooldown_elapsed(&self, now_ms: i64) -> bool {
        match self.last_event_ms {
            Some(t) => now_ms - t >= self.config.cooldown_ms,
            None => true,
        }
    }

    fn status(&self, now_ms: i64) -> ArrhythmiaStatus {
        match self.last_event_ms {
            Some(t) if now_ms - t < self.config.cooldown_ms => ArrhythmiaStatus::Irregular,
            _ => ArrhythmiaStatus::Normal,
        }
    }

    fn assessment(&self, status: ArrhythmiaStatus, beat_abnormal: bool) -> ArrhythmiaAssessment {
        ArrhythmiaAssessment {
            status,
            event_count: self.event_count,
            beat_abnormal,
            consecutive_abnormal: self.consecutive_abnormal,
        }
    }
}

impl Default for ArrhythmiaDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady(n: usize) -> Vec<f32> {
        vec![800.0; n]
    }

    #[test]
    fn test_learning_phase_reports_calibrating() {
        let mut detector = ArrhythmiaDetector::new();
        let a = detector.update(0, &steady(10), None, true, true);
        assert_eq!(a.status, ArrhythmiaStatus::Calibrating);
        let a = detector.update(5_000, &[400.0, 400.0, 400.0, 1200.0], None, true, true);
        assert_eq!(a.status, ArrhythmiaStatus::Calibrating);
        assert_eq!(a.event_count, 0);
    }

    #[test]
    fn test_steady_rhythm_never_flags() {
        let mut detector = ArrhythmiaDetector::new();
        detector.update(0, &[], None, false, true);

        // Under 25% variation around the mean: all beats normal
        let mut intervals: Vec<f32> = steady(8);
        for beat in 0..50 {
            let rr = 800.0 + if beat % 2 == 0 { 90.0 } else { -90.0 };
            intervals.push(rr);
            if intervals.len() > 20 {
                intervals.remove(0);
            }
            let now = 10_000 + beat * 800;
            let a = detector.update(now as i64, &intervals, None, true, true);
            assert_eq!(a.event_count, 0, "flagged at beat {beat}");
            assert!(!a.beat_abnormal);
        }
    }

    #[test]
    fn test_sustained_premature_run_registers_once() {
        let mut detector = ArrhythmiaDetector::new();
        detector.update(0, &[], None, false, true);

        let mut intervals = steady(8);
        let mut now = 10_000i64;
        let mut confirmed = 0u32;
        // Six premature beats in a row, well past the confirmation threshold
        for _ in 0..6 {
            intervals.push(400.0); // 50% of the 800 ms mean
            now += 400;
            let a = detector.update(now, &intervals, None, true, true);
            confirmed = a.event_count;
        }
        assert_eq!(confirmed, 1, "must register exactly once, not per beat");
    }

    #[test]
    fn test_cooldown_blocks_second_event() {
        let config = ArrhythmiaConfig::default();
        let mut detector = ArrhythmiaDetector::new();
        detector.update(0, &[], None, false, true);

        let mut intervals = steady(8);
        let mut now = 10_000i64;
        for _ in 0..3 {
            intervals.push(400.0);
            now += 400;
            detector.update(now, &intervals, None, true, true);
        }
        assert_eq!(detector.event_count(), 1);

        // More abnormal beats inside the cooldown window
        for _ in 0..4 {
            intervals.push(400.0);
            now += 400;
            detector.update(now, &intervals, None, true, true);
        }
        assert_eq!(detector.event_count(), 1);

        // After the cooldown a new run may confirm again
        now += config.cooldown_ms;
        intervals = steady(8);
        for _ in 0..4 {
            intervals.push(400.0);
            now += 400;
            detector.update(now, &intervals, None, true, true);
        }
        assert_eq!(detector.event_count(), 2);
    }

    #[test]
    fn test_status_irregular_during_cooldown() {
        let mut detector = ArrhythmiaDetector::new();
        detector.update(0, &[], None, false, true);

        let mut intervals = steady(8);
        let mut now = 10_000i64;
        for _ in 0..3 {
            intervals.push(400.0);
            now += 400;
            detector.update(now, &intervals, None, true, true);
        }
        let a = detector.update(now + 1_000, &intervals, None, false, true);
        assert_eq!(a.status, ArrhythmiaStatus::Irregular);

        let a = detector.update(now + 60_000, &intervals, None, false, true);
        assert_eq!(a.status, ArrhythmiaStatus::Normal);
    }

    #[test]
    fn test_bad_signal_decays_counter() {
        let mut detector = ArrhythmiaDetector::new();
        detector.update(0, &[], None, false, true);

        let mut intervals = steady(8);
        let mut now = 10_000i64;
        for _ in 0..2 {
            intervals.push(400.0);
            now += 400;
            detector.update(now, &intervals, None, true, true);
        }
        let before = detector.consecutive_abnormal;
        assert_eq!(before, 2);

        let a = detector.update(now + 100, &intervals, None, false, false);
        assert_eq!(a.consecutive_abnormal, 1, "dropout should decay, not reset");
        assert_eq!(a.event_count, 0);
    }

    #[test]
    fn test_session_event_cap() {
        let config = ArrhythmiaConfig {
            cooldown_ms: 0,
            max_session_events: 2,
            ..ArrhythmiaConfig::default()
        };
        let mut detector = ArrhythmiaDetector::with_config(config);
        detector.update(0, &[], None, false, true);

        let mut now = 10_000i64;
        // Three separate premature runs, each enough to confirm an event
        for _ in 0..3 {
            let mut intervals = steady(8);
            for _ in 0..3 {
                intervals.push(400.0);
                now += 400;
                detector.update(now, &intervals, None, true, true);
            }
            now += 5_000;
        }
        assert_eq!(detector.event_count(), 2);
    }

    #[test]
    fn test_snapshot_captured_on_event() {
        let mut detector = ArrhythmiaDetector::new();
        detector.update(0, &[], None, false, true);

        let mut intervals = steady(8);
        let mut now = 10_000i64;
        for _ in 0..3 {
            intervals.push(400.0);
            now += 400;
            detector.update(now, &intervals, None, true, true);
        }
        let snapshot = detector.event_snapshot();
        assert!(!snapshot.is_empty());
        assert!(snapshot.contains(&400.0));
    }

    #[test]
    fn test_reset() {
        let mut detector = ArrhythmiaDetector::new();
        detector.update(0, &[], None, false, true);
        let mut intervals = steady(8);
        for i in 0..3 {
            intervals.push(400.0);
            detector.update(10_000 + i * 400, &intervals, None, true, true);
        }
        assert_eq!(detector.event_count(), 1);

        detector.reset();
        assert_eq!(detector.event_count(), 0);
        // A fresh session is back in the learning phase
        let a = detector.update(100_000, &steady(10), None, true, true);
        assert_eq!(a.status, ArrhythmiaStatus::Calibrating);
    }
}
