// src/decoder/control.rs

use std::time::Duration;

/// Commands the streaming decoder thread can handle.
pub enum DecoderCmd {
    Seek(Duration),
    /// Playback speed multiplier; the decoder re-derives its resampling ratio.
    SetRate(f64),
    Stop,
}
