//! Property-based tests for peak extraction.

use proptest::prelude::*;
use waveboard::peaks::{export_json, extract_peaks, fit_to_width, max_peak, DEFAULT_STEP_DIVISOR};

fn channels() -> impl Strategy<Value = Vec<Vec<f32>>> {
    (1usize..4, 1usize..2_000).prop_flat_map(|(count, frames)| {
        prop::collection::vec(prop::collection::vec(-1.0f32..1.0, frames), count)
    })
}

proptest! {
    /// Property: one non-negative value per requested column
    #[test]
    fn length_matches_and_values_are_magnitudes(
        input in channels(),
        length in 1usize..600,
        divisor in 1usize..20,
    ) {
        let peaks = extract_peaks(&input, length, divisor);
        prop_assert_eq!(peaks.len(), length);
        prop_assert!(peaks.iter().all(|p| *p >= 0.0 && p.is_finite()));
    }

    /// Property: no column is louder than the loudest input sample
    #[test]
    fn peaks_never_exceed_input(input in channels(), length in 1usize..300) {
        let loudest = input
            .iter()
            .flatten()
            .fold(0.0f32, |m, v| m.max(v.abs()));
        let peaks = extract_peaks(&input, length, DEFAULT_STEP_DIVISOR);
        prop_assert!(max_peak(&peaks) <= loudest);
    }

    /// Property: silence stays silent
    #[test]
    fn silence_gives_zeros(frames in 1usize..5_000, length in 1usize..500) {
        let input = vec![vec![0.0f32; frames]; 2];
        let peaks = extract_peaks(&input, length, DEFAULT_STEP_DIVISOR);
        prop_assert!(peaks.iter().all(|p| *p == 0.0));
    }

    /// Property: resampling to a width keeps values from the source
    #[test]
    fn fit_to_width_only_picks_existing_values(
        peaks in prop::collection::vec(0.0f32..1.0, 1..400),
        width in 1usize..900,
    ) {
        let fitted = fit_to_width(&peaks, width);
        prop_assert_eq!(fitted.len(), width);
        prop_assert!(fitted.iter().all(|v| peaks.contains(v)));
    }
}

#[test]
fn every_sample_counts_when_windows_are_small() {
    let mut quiet = vec![0.0f32; 100];
    quiet[57] = -0.75;
    let peaks = extract_peaks(&[quiet], 10, DEFAULT_STEP_DIVISOR);
    assert_eq!(peaks[5], 0.75);
    assert_eq!(peaks.iter().filter(|p| **p > 0.0).count(), 1);
}

#[test]
fn empty_inputs_give_empty_peaks() {
    assert!(extract_peaks(&[], 10, DEFAULT_STEP_DIVISOR).is_empty());
    assert!(extract_peaks(&[Vec::new()], 10, DEFAULT_STEP_DIVISOR).is_empty());
    assert!(extract_peaks(&[vec![0.5; 10]], 0, DEFAULT_STEP_DIVISOR).is_empty());
}

#[test]
fn export_rounds_to_accuracy() {
    assert_eq!(export_json(&[0.123_456, 1.0, 0.0], 100), "[0.12,1.0,0.0]");
}
