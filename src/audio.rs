// src/audio.rs

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};

use crate::error::{PlayerError, Result};

/// Helper struct to hold output device info
pub struct OutputConfig {
    pub device: Device,
    pub config: StreamConfig,
    pub sample_format: SampleFormat,
    pub output_channels: usize,
    pub output_sample_rate: u32,
}

/// Finds the default audio output device and its config. A host without
/// one is a capability problem, not a hard error.
pub fn setup_output_device() -> Result<OutputConfig> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlayerError::Capability("no output device available".into()))?;
    let supported_config = device
        .default_output_config()
        .map_err(|e| PlayerError::Capability(e.to_string()))?;
    let sample_format = supported_config.sample_format();
    let config = supported_config.config();
    let output_channels = config.channels as usize;
    let output_sample_rate = config.sample_rate.0;

    log::info!(
        "output device: channels: {}, sample_rate: {:?}",
        output_channels,
        config.sample_rate
    );

    Ok(OutputConfig {
        device,
        config,
        sample_format,
        output_channels,
        output_sample_rate,
    })
}

/// Build CPAL output stream. `render` fills an interleaved f32 buffer that
/// is then converted to the device format.
fn build_stream<T, F>(device: &Device, config: &StreamConfig, mut render: F) -> Result<Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + SizedSample,
    F: FnMut(&mut [f32]) + Send + 'static,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let buf = &mut scratch[..data.len()];
                buf.fill(0.0);
                render(buf);
                for (out, &s) in data.iter_mut().zip(buf.iter()) {
                    *out = T::from_sample(s);
                }
            },
            |err| log::error!("output stream error: {err}"),
            None,
        )
        .map_err(|e| PlayerError::Capability(e.to_string()))
}

/// Opens and starts a stream on `output`.
pub fn open_output_stream<F>(output: &OutputConfig, render: F) -> Result<Stream>
where
    F: FnMut(&mut [f32]) + Send + 'static,
{
    let OutputConfig {
        device,
        config,
        sample_format,
        ..
    } = output;

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32, _>(device, config, render)?,
        SampleFormat::I16 => build_stream::<i16, _>(device, config, render)?,
        SampleFormat::U16 => build_stream::<u16, _>(device, config, render)?,
        other => {
            return Err(PlayerError::Capability(format!(
                "unsupported sample format: {other:?}"
            )));
        }
    };
    stream
        .play()
        .map_err(|e| PlayerError::Capability(e.to_string()))?;
    Ok(stream)
}
