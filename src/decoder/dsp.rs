// src/decoder/dsp.rs

/// Splits interleaved frames onto the end of per-channel vectors.
pub fn append_interleaved_to_planar(interleaved: &[f32], planar: &mut [Vec<f32>]) {
    let channels = planar.len();
    if channels == 0 {
        return;
    }
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &s) in frame.iter().enumerate() {
            planar[ch].push(s);
        }
    }
}

/// Frames available in every channel.
pub fn planar_len(planar: &[Vec<f32>]) -> usize {
    planar.iter().map(|v| v.len()).min().unwrap_or(0)
}

/// Removes and returns the first `frames` frames of every channel.
pub fn take_from_planar(planar: &mut [Vec<f32>], frames: usize) -> Vec<Vec<f32>> {
    planar
        .iter_mut()
        .map(|ch| {
            let n = frames.min(ch.len());
            let tail = ch.split_off(n);
            std::mem::replace(ch, tail)
        })
        .collect()
}

pub fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let channels = planar.len();
    let frames = planar_len(planar);
    let mut out = Vec::with_capacity(frames * channels);
    for f in 0..frames {
        for ch in planar {
            out.push(ch[f]);
        }
    }
    out
}

/// Maps interleaved audio from `in_ch` to `out_ch` channels: mono is
/// duplicated, stereo is averaged down, wider layouts are grouped.
pub fn updown_mix_interleaved(input: &[f32], in_ch: usize, out_ch: usize) -> Vec<f32> {
    if in_ch == out_ch || in_ch == 0 || out_ch == 0 {
        return input.to_vec();
    }
    let frames = input.len() / in_ch;
    let mut out = vec![0.0f32; frames * out_ch];

    for f in 0..frames {
        let src = &input[f * in_ch..(f + 1) * in_ch];
        let dst = &mut out[f * out_ch..(f + 1) * out_ch];
        if out_ch < in_ch {
            let factor = in_ch as f32 / out_ch as f32;
            for (oc, slot) in dst.iter_mut().enumerate() {
                let start = (oc as f32 * factor).floor() as usize;
                let end = (((oc + 1) as f32 * factor).ceil() as usize).min(in_ch);
                let group = &src[start..end];
                *slot = if group.is_empty() {
                    0.0
                } else {
                    group.iter().sum::<f32>() / group.len() as f32
                };
            }
        } else {
            for (oc, slot) in dst.iter_mut().enumerate() {
                *slot = src[oc % in_ch];
            }
        }
    }

    out
}

#[inline]
pub fn fade_samples_ms(sample_rate: u32, ms: u32) -> usize {
    ((sample_rate as u64 * ms as u64) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_round_trip() {
        let mut planar = vec![Vec::new(), Vec::new()];
        append_interleaved_to_planar(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0], &mut planar);
        assert_eq!(planar[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(planar[1], vec![-1.0, -2.0, -3.0]);

        let head = take_from_planar(&mut planar, 2);
        assert_eq!(interleave(&head), vec![1.0, -1.0, 2.0, -2.0]);
        assert_eq!(planar_len(&planar), 1);
    }

    #[test]
    fn stereo_to_mono_averages() {
        assert_eq!(updown_mix_interleaved(&[1.0, 0.0, 0.5, 0.5], 2, 1), vec![0.5, 0.5]);
    }

    #[test]
    fn mono_to_stereo_duplicates() {
        assert_eq!(updown_mix_interleaved(&[0.25, -0.5], 1, 2), vec![0.25, 0.25, -0.5, -0.5]);
    }
}
