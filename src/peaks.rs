// src/peaks.rs

/// Default for `PlaybackParams::peak_step_divisor`.
pub const DEFAULT_STEP_DIVISOR: usize = 10;

/// One magnitude per column. Each column covers `frames / length` samples;
/// every `window / divisor`-th sample is inspected (at least every one). The
/// loudest channel wins the column.
///
/// No columns, no channels, or no frames give an empty result.
pub fn extract_peaks(channels: &[Vec<f32>], length: usize, divisor: usize) -> Vec<f32> {
    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    if length == 0 || frames == 0 {
        return Vec::new();
    }

    let sample_size = frames as f64 / length as f64;
    let step = ((sample_size / divisor.max(1) as f64) as usize).max(1);
    let mut peaks = vec![0.0f32; length];

    for chan in channels {
        let chan = &chan[..frames];
        for (i, peak) in peaks.iter_mut().enumerate() {
            let start = (i as f64 * sample_size) as usize;
            let end = ((start as f64 + sample_size) as usize).min(frames);
            let max = chan[start.min(end)..end]
                .iter()
                .step_by(step)
                .fold(0.0f32, |m, &v| m.max(v.abs()));
            if max > *peak {
                *peak = max;
            }
        }
    }

    peaks
}

/// Largest value, or 0 for an empty slice.
pub fn max_peak(peaks: &[f32]) -> f32 {
    peaks.iter().copied().fold(0.0f32, f32::max)
}

/// Rounds every peak to `1 / accuracy` and serializes the array.
pub fn export_json(peaks: &[f32], accuracy: u32) -> String {
    let accuracy = accuracy.max(1) as f64;
    let rounded: Vec<f64> = peaks
        .iter()
        .map(|&p| (p as f64 * accuracy).round() / accuracy)
        .collect();
    serde_json::to_string(&rounded).unwrap_or_else(|_| "[]".to_string())
}

/// Picks `width` columns out of `peaks` by nearest index, for drawing a
/// peak array into a surface of a different width.
pub fn fit_to_width(peaks: &[f32], width: usize) -> Vec<f32> {
    if peaks.is_empty() || width == 0 {
        return Vec::new();
    }
    if peaks.len() == width {
        return peaks.to_vec();
    }
    let scale = peaks.len() as f64 / width as f64;
    (0..width)
        .map(|x| peaks[((x as f64 * scale) as usize).min(peaks.len() - 1)])
        .collect()
}
