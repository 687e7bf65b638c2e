// src/backend/graph.rs

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};
use cpal::Stream;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::{open_output_stream, setup_output_device};
use crate::decoder::DecodedAudio;
use crate::error::Result;

pub const FFT_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FilterKind {
    LowPass,
    HighPass,
    BandPass,
    Notch,
    Peaking,
    LowShelf,
    HighShelf,
}

/// One stage of the filter chain between the analyser and the gain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub freq: f32,
    pub q: f32,
    /// dB, only used by the peaking and shelf types.
    pub gain: f32,
}

impl FilterSpec {
    fn coefficients(&self, sample_rate: u32) -> Option<Coefficients<f32>> {
        let freq = self.freq.clamp(20.0, (sample_rate as f32 / 2.0) - 1.0);
        let q = self.q.max(0.1);
        let kind = match self.kind {
            FilterKind::LowPass => Type::LowPass,
            FilterKind::HighPass => Type::HighPass,
            FilterKind::BandPass => Type::BandPass,
            FilterKind::Notch => Type::Notch,
            FilterKind::Peaking => Type::PeakingEQ(self.gain),
            FilterKind::LowShelf => Type::LowShelf(self.gain),
            FilterKind::HighShelf => Type::HighShelf(self.gain),
        };
        Coefficients::<f32>::from_params(kind, sample_rate.hz(), freq.hz(), q).ok()
    }
}

struct FilterStage {
    per_channel: Vec<DirectForm2Transposed<f32>>,
}

impl FilterStage {
    #[inline]
    fn process(&mut self, sample: f32, channel: usize) -> f32 {
        match self.per_channel.get_mut(channel) {
            Some(f) => {
                let out = f.run(sample);
                // Denormal protection
                if out.abs() < 1e-20 { 0.0 } else { out }
            }
            None => sample,
        }
    }
}

struct Voice {
    id: u64,
    buffer: Arc<DecodedAudio>,
    /// Read position in buffer frames.
    pos: f64,
    end: f64,
    step: f64,
}

impl Voice {
    fn sample(&self, channel: usize) -> f32 {
        let n = self.buffer.channels.len();
        if n == 0 {
            return 0.0;
        }
        let data = &self.buffer.channels[channel % n];
        let i = self.pos.floor() as usize;
        let frac = (self.pos - i as f64) as f32;
        let a = data.get(i).copied().unwrap_or(0.0);
        let b = data.get(i + 1).copied().unwrap_or(a);
        a + (b - a) * frac
    }
}

/// Everything the render callback touches. Shared by the realtime and the
/// offline graph; only the driver differs.
pub struct GraphCore {
    sample_rate: u32,
    channels: usize,
    frames_rendered: u64,
    gain: f32,
    voice: Option<Voice>,
    next_voice: u64,
    filters: Vec<FilterStage>,
    tap: Vec<f32>,
    tap_pos: usize,
}

impl GraphCore {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            frames_rendered: 0,
            gain: 1.0,
            voice: None,
            next_voice: 0,
            filters: Vec::new(),
            tap: vec![0.0; FFT_SIZE],
            tap_pos: 0,
        }
    }

    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    /// Interleaved output, `channels` wide.
    pub fn render(&mut self, out: &mut [f32]) {
        let channels = self.channels;
        for frame in out.chunks_exact_mut(channels) {
            let mut mono = 0.0f32;
            match self.voice.as_mut() {
                Some(voice) if voice.pos < voice.end => {
                    for (ch, slot) in frame.iter_mut().enumerate() {
                        let s = voice.sample(ch);
                        mono += s;
                        *slot = s;
                    }
                    voice.pos += voice.step;
                }
                _ => {
                    self.voice = None;
                    frame.fill(0.0);
                }
            }

            self.tap[self.tap_pos] = mono / channels as f32;
            self.tap_pos = (self.tap_pos + 1) % FFT_SIZE;

            for (ch, slot) in frame.iter_mut().enumerate() {
                let mut s = *slot;
                for stage in &mut self.filters {
                    s = stage.process(s, ch);
                }
                *slot = s * self.gain;
            }
            self.frames_rendered += 1;
        }
    }

    fn start_voice(&mut self, buffer: Arc<DecodedAudio>, rate: f64, offset: f64, duration: f64) -> u64 {
        let id = self.next_voice;
        self.next_voice += 1;
        let src_rate = buffer.sample_rate.max(1) as f64;
        let frames = buffer.frames() as f64;
        let pos = (offset.max(0.0) * src_rate).min(frames);
        let end = (pos + duration.max(0.0) * src_rate).min(frames);
        self.voice = Some(Voice {
            id,
            buffer,
            pos,
            end,
            step: rate * src_rate / self.sample_rate as f64,
        });
        id
    }

    fn stop_voice(&mut self, id: u64) {
        if self.voice.as_ref().is_some_and(|v| v.id == id) {
            self.voice = None;
        }
    }

    fn voice_active(&self, id: u64) -> bool {
        self.voice.as_ref().is_some_and(|v| v.id == id && v.pos < v.end)
    }

    fn set_filters(&mut self, specs: &[FilterSpec]) {
        let (rate, channels) = (self.sample_rate, self.channels);
        self.filters = specs
            .iter()
            .filter_map(|spec| match spec.coefficients(rate) {
                Some(c) => Some(FilterStage {
                    per_channel: (0..channels).map(|_| DirectForm2Transposed::<f32>::new(c)).collect(),
                }),
                None => {
                    log::warn!("dropping filter with invalid coefficients: {spec:?}");
                    None
                }
            })
            .collect();
    }

    /// Oldest-first copy of the analyser window.
    fn tap_window(&self) -> Vec<f32> {
        let mut w = Vec::with_capacity(FFT_SIZE);
        w.extend_from_slice(&self.tap[self.tap_pos..]);
        w.extend_from_slice(&self.tap[..self.tap_pos]);
        w
    }
}

fn lock(core: &Arc<Mutex<GraphCore>>) -> MutexGuard<'_, GraphCore> {
    core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A playback unit that has not been started. Starting consumes it.
pub struct SourceNode {
    buffer: Arc<DecodedAudio>,
    rate: f64,
    core: Option<Arc<Mutex<GraphCore>>>,
}

impl SourceNode {
    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    /// Plays `duration` seconds starting `offset` seconds into the buffer.
    /// An unconnected node plays into nothing.
    pub fn start(self, offset: f64, duration: f64) -> RunningSource {
        let id = self
            .core
            .as_ref()
            .map(|core| lock(core).start_voice(self.buffer.clone(), self.rate, offset, duration));
        RunningSource { core: self.core, id }
    }
}

/// A started playback unit. Stopping consumes it, so it can never be
/// started again.
pub struct RunningSource {
    core: Option<Arc<Mutex<GraphCore>>>,
    id: Option<u64>,
}

impl RunningSource {
    pub fn stop(self) {
        if let (Some(core), Some(id)) = (&self.core, self.id) {
            lock(core).stop_voice(id);
        }
    }

    /// False once the unit ran past its end.
    pub fn is_active(&self) -> bool {
        match (&self.core, self.id) {
            (Some(core), Some(id)) => lock(core).voice_active(id),
            _ => false,
        }
    }
}

/// The sample-accurate audio graph: one source feeding an analyser, an
/// optional filter chain and a gain stage.
pub trait AudioGraph {
    fn core(&self) -> &Arc<Mutex<GraphCore>>;

    /// Stops the driver. The graph keeps answering queries but no longer
    /// advances.
    fn close(&mut self);

    /// Seconds of audio rendered since the graph was created.
    fn current_time(&self) -> f64 {
        lock(self.core()).current_time()
    }

    fn sample_rate(&self) -> u32 {
        lock(self.core()).sample_rate
    }

    fn create_source(&self, buffer: Arc<DecodedAudio>, rate: f64) -> SourceNode {
        SourceNode {
            buffer,
            rate,
            core: None,
        }
    }

    fn connect(&self, node: &mut SourceNode) {
        node.core = Some(self.core().clone());
    }

    fn set_gain(&self, gain: f32) {
        lock(self.core()).gain = gain;
    }

    fn gain(&self) -> f32 {
        lock(self.core()).gain
    }

    /// Replaces the whole chain; an empty slice removes it.
    fn set_filters(&self, filters: &[FilterSpec]) {
        lock(self.core()).set_filters(filters);
    }

    /// Latest `FFT_SIZE` samples as bytes, silence at 128.
    fn analyser_time_domain(&self) -> Vec<u8> {
        lock(self.core())
            .tap_window()
            .into_iter()
            .map(|s| (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// `FFT_SIZE / 2` magnitude bins mapped from -100..-30 dB onto 0..255.
    fn analyser_frequency(&self) -> Vec<u8> {
        let window = lock(self.core()).tap_window();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let mut bins: Vec<Complex<f32>> = window
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let w = 0.5
                    * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (FFT_SIZE - 1) as f32).cos());
                Complex { re: s * w, im: 0.0 }
            })
            .collect();
        fft.process(&mut bins);

        bins[..FFT_SIZE / 2]
            .iter()
            .map(|c| {
                let mag = c.norm() / FFT_SIZE as f32;
                let db = if mag > 0.0 { 20.0 * mag.log10() } else { -100.0 };
                (255.0 * (db + 100.0) / 70.0).clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

/// Graph driven by the default cpal output device. Its clock is the frame
/// counter of the device callback.
pub struct CpalGraph {
    core: Arc<Mutex<GraphCore>>,
    stream: Option<Stream>,
}

impl CpalGraph {
    pub fn new() -> Result<Self> {
        let output = setup_output_device()?;
        let core = Arc::new(Mutex::new(GraphCore::new(
            output.output_sample_rate,
            output.output_channels,
        )));
        let callback_core = core.clone();
        let stream = open_output_stream(&output, move |buf| lock(&callback_core).render(buf))?;
        Ok(Self {
            core,
            stream: Some(stream),
        })
    }
}

impl AudioGraph for CpalGraph {
    fn core(&self) -> &Arc<Mutex<GraphCore>> {
        &self.core
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

/// Graph whose clock only moves when someone renders through an
/// [`OfflineHandle`].
pub struct OfflineGraph {
    core: Arc<Mutex<GraphCore>>,
    closed: Arc<AtomicBool>,
}

impl OfflineGraph {
    pub fn new(sample_rate: u32, channels: usize) -> (Self, OfflineHandle) {
        let core = Arc::new(Mutex::new(GraphCore::new(sample_rate, channels)));
        let closed = Arc::new(AtomicBool::new(false));
        let handle = OfflineHandle {
            core: core.clone(),
            closed: closed.clone(),
        };
        (Self { core, closed }, handle)
    }

    pub(crate) fn from_handle(handle: &OfflineHandle) -> Self {
        handle.closed.store(false, Ordering::Relaxed);
        Self {
            core: handle.core.clone(),
            closed: handle.closed.clone(),
        }
    }
}

impl AudioGraph for OfflineGraph {
    fn core(&self) -> &Arc<Mutex<GraphCore>> {
        &self.core
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

/// Drives an [`OfflineGraph`]: rendering frames is what advances its clock.
#[derive(Clone)]
pub struct OfflineHandle {
    core: Arc<Mutex<GraphCore>>,
    closed: Arc<AtomicBool>,
}

impl OfflineHandle {
    /// Renders `frames` frames and returns them interleaved.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut core = lock(&self.core);
        let mut out = vec![0.0; frames * core.channels];
        core.render(&mut out);
        out
    }

    pub fn advance(&self, seconds: f64) -> Vec<f32> {
        let rate = lock(&self.core).sample_rate;
        self.render_frames((seconds * rate as f64).round() as usize)
    }

    pub fn current_time(&self) -> f64 {
        lock(&self.core).current_time()
    }

    pub fn sample_rate(&self) -> u32 {
        lock(&self.core).sample_rate
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}
