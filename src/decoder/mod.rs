// src/decoder/mod.rs

pub mod control;
pub mod dsp;
pub mod output;
pub mod resample;
pub mod stream;

use anyhow::{anyhow, bail, Context};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

pub use control::DecoderCmd;
pub use stream::{spawn_stream_decoder, StreamStatus};

/// A fully decoded clip, one `Vec` per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Self {
        let mut channels = vec![Vec::with_capacity(samples.len() / channel_count.max(1)); channel_count];
        dsp::append_interleaved_to_planar(samples, &mut channels);
        Self::new(sample_rate, channels)
    }

    pub fn frames(&self) -> usize {
        dsp::planar_len(&self.channels)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    /// Seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn resampled(&self, target_rate: u32) -> anyhow::Result<Self> {
        if target_rate == self.sample_rate {
            return Ok(self.clone());
        }
        let channels = resample::resample_planar(&self.channels, self.sample_rate, target_rate)?;
        Ok(Self::new(target_rate, channels))
    }
}

pub(crate) fn probe(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
) -> anyhow::Result<Box<dyn FormatReader>> {
    let mss = MediaSourceStream::new(source, Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    let probed = get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("unsupported or corrupt audio")?;
    Ok(probed.format)
}

/// Decodes a complete in-memory file. Packets that fail to decode are
/// skipped; a file that yields no audio at all is an error.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> anyhow::Result<DecodedAudio> {
    let mut format = probe(Box::new(Cursor::new(bytes)), extension)?;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut planar: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(SymphoniaError::IoError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let ch = spec.channels.count();
        if planar.is_empty() {
            planar = vec![Vec::new(); ch];
            sample_rate = spec.rate;
        }

        let too_small = sample_buf
            .as_ref()
            .is_none_or(|buf| buf.capacity() < decoded.capacity() * ch);
        if too_small {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        if ch == planar.len() {
            dsp::append_interleaved_to_planar(buf.samples(), &mut planar);
        } else {
            let mixed = dsp::updown_mix_interleaved(buf.samples(), ch, planar.len());
            dsp::append_interleaved_to_planar(&mixed, &mut planar);
        }
    }

    if dsp::planar_len(&planar) == 0 || sample_rate == 0 {
        bail!("no audio frames decoded");
    }
    Ok(DecodedAudio::new(sample_rate, planar))
}
