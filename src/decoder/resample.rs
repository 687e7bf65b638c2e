// src/decoder/resample.rs

use anyhow::Result;
use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use crate::decoder::dsp;

const CHUNK_SIZE: usize = 1024;

/// `None` when the rates already match.
pub fn build_resampler(
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
) -> Result<Option<SincFixedIn<f32>>> {
    if src_rate == dst_rate {
        return Ok(None);
    }
    build_resampler_ratio(dst_rate as f64 / src_rate as f64, channels).map(Some)
}

/// Output frames per input frame is `ratio`. The streaming element folds
/// its playback rate into this.
pub fn build_resampler_ratio(ratio: f64, channels: usize) -> Result<SincFixedIn<f32>> {
    let sinc_len = 256usize;
    let window = WindowFunction::BlackmanHarris2;
    let f_cutoff = calculate_cutoff(sinc_len, window);
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window,
    };
    let r = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, channels)?;
    Ok(r)
}

pub fn try_process_exact(
    resampler: &mut SincFixedIn<f32>,
    stage_planar: &mut [Vec<f32>],
) -> Option<Vec<Vec<f32>>> {
    let need = resampler.input_frames_next();
    let have = dsp::planar_len(stage_planar);
    if have < need {
        return None;
    }
    let in_block = dsp::take_from_planar(stage_planar, need);
    resampler.process(&in_block, None).ok()
}

pub fn drain_remaining_planar(stage_planar: &mut [Vec<f32>]) -> Option<Vec<Vec<f32>>> {
    let have = dsp::planar_len(stage_planar);
    (have > 0).then(|| dsp::take_from_planar(stage_planar, have))
}

pub fn process_partial_some(
    resampler: &mut SincFixedIn<f32>,
    in_block: &mut [Vec<f32>],
) -> Result<Vec<Vec<f32>>> {
    Ok(resampler.process_partial(Some(&*in_block), None)?)
}

pub fn process_partial_none(resampler: &mut SincFixedIn<f32>) -> Result<Vec<Vec<f32>>> {
    Ok(resampler.process_partial::<Vec<f32>>(None, None)?)
}

fn append_planar(dst: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (d, s) in dst.iter_mut().zip(block) {
        d.extend(s);
    }
}

/// Resamples a whole clip. The resampler's output delay is trimmed from the
/// front and the result is cut to `frames * dst / src`, so the duration in
/// seconds does not change.
pub fn resample_planar(input: &[Vec<f32>], src_rate: u32, dst_rate: u32) -> Result<Vec<Vec<f32>>> {
    let channels = input.len();
    let frames = dsp::planar_len(input);
    if channels == 0 || frames == 0 || src_rate == 0 {
        return Ok(vec![Vec::new(); channels]);
    }
    let Some(mut resampler) = build_resampler(src_rate, dst_rate, channels)? else {
        return Ok(input.iter().map(|ch| ch[..frames].to_vec()).collect());
    };

    let expected = (frames as f64 * dst_rate as f64 / src_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut stage: Vec<Vec<f32>> = input.iter().map(|ch| ch[..frames].to_vec()).collect();
    let mut out = vec![Vec::with_capacity(expected + delay); channels];

    while let Some(block) = try_process_exact(&mut resampler, &mut stage) {
        append_planar(&mut out, block);
    }
    if let Some(mut rest) = drain_remaining_planar(&mut stage) {
        append_planar(&mut out, process_partial_some(&mut resampler, &mut rest)?);
    }
    // Push zeros through until the delayed tail has come out.
    for _ in 0..16 {
        if dsp::planar_len(&out) >= expected + delay {
            break;
        }
        let tail = process_partial_none(&mut resampler)?;
        if dsp::planar_len(&tail) == 0 {
            break;
        }
        append_planar(&mut out, tail);
    }

    for ch in &mut out {
        ch.drain(..delay.min(ch.len()));
        ch.truncate(expected);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_a_copy() {
        let input = vec![vec![0.1, 0.2, 0.3]];
        assert_eq!(resample_planar(&input, 44_100, 44_100).unwrap(), input);
    }

    #[test]
    fn preserves_duration() {
        let input = vec![vec![0.25f32; 22_050]; 2];
        let out = resample_planar(&input, 22_050, 48_000).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 48_000);
        assert_eq!(out[1].len(), 48_000);
    }

    #[test]
    fn empty_input() {
        let out = resample_planar(&[Vec::new()], 8_000, 16_000).unwrap();
        assert_eq!(out, vec![Vec::<f32>::new()]);
    }
}
