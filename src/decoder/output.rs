// src/decoder/output.rs

use ringbuf::traits::Producer as RbProducer;

/// Pushes `data`, ramping in the first `post_seek_fade_samples` so a seek
/// does not click. Stops at the first sample that does not fit and returns
/// how many were pushed; the caller keeps the rest for later.
pub fn push_with_fade<P: RbProducer<Item = f32>>(
    producer: &mut P,
    data: &[f32],
    post_seek_fade_samples: &mut usize,
) -> usize {
    let mut idx = 0usize;

    if *post_seek_fade_samples > 0 && !data.is_empty() {
        let n = (*post_seek_fade_samples).min(data.len());
        for i in 0..n {
            let ramp = (i as f32) / (n as f32);
            if producer.try_push(data[i] * ramp).is_err() {
                return idx;
            }
            idx += 1;
        }
        *post_seek_fade_samples -= n;
    }

    while idx < data.len() {
        if producer.try_push(data[idx]).is_err() {
            break;
        }
        idx += 1;
    }
    idx
}
