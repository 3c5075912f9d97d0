//! Property-based tests for graceful degradation
//!
//! The pipeline contract is that arbitrary input degrades outputs to neutral
//! values, it never panics and never emits out-of-range vitals.

use proptest::prelude::*;

use crate::pipeline::{PpgProcessor, PpgSample};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn process_never_panics_and_stays_in_range(
        intensities in prop::collection::vec(-1_000.0f32..1_000.0, 0..200),
        step_ms in 1i64..100,
    ) {
        let mut processor = PpgProcessor::new();
        for (i, intensity) in intensities.iter().enumerate() {
            let output = processor.process(PpgSample::new(i as i64 * step_ms, *intensity));

            prop_assert!((0.0..=100.0).contains(&output.quality));
            prop_assert!((0.0..=100.0).contains(&output.confidence));
            prop_assert!(output.bpm == 0 || (40..=200).contains(&output.bpm));
            for rr in &output.rr_intervals_ms {
                prop_assert!((300.0..=1500.0).contains(rr));
            }
        }
    }

    #[test]
    fn non_finite_samples_never_poison_state(
        prefix in prop::collection::vec(0.0f32..255.0, 0..50),
    ) {
        let mut processor = PpgProcessor::new();
        for (i, intensity) in prefix.iter().enumerate() {
            processor.process(PpgSample::new(i as i64 * 33, *intensity));
        }

        let n = prefix.len() as i64;
        for (offset, bad) in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY].iter().enumerate() {
            let output = processor.process(PpgSample::new((n + offset as i64) * 33, *bad));
            prop_assert!(output.filtered_value.is_finite());
            prop_assert!(output.quality.is_finite());
        }
    }

    #[test]
    fn reset_always_returns_to_empty(
        intensities in prop::collection::vec(0.0f32..255.0, 1..100),
    ) {
        let mut processor = PpgProcessor::new();
        for (i, intensity) in intensities.iter().enumerate() {
            processor.process(PpgSample::new(i as i64 * 33, *intensity));
        }

        processor.full_reset();
        prop_assert_eq!(processor.frame_count(), 0);
        let output = processor.last_output();
        prop_assert_eq!(output.bpm, 0);
        prop_assert!(!output.finger_detected);
        prop_assert!(output.rr_intervals_ms.is_empty());
    }
}
