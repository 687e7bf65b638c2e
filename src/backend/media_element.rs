// src/backend/media_element.rs

use ringbuf::traits::{Consumer, Split};
use ringbuf::HeapRb;
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    mpsc::Sender,
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::Stream;

use super::{sanitize_rate, AudioBackend, AudioSource, BackendEvent};
use crate::audio::{open_output_stream, setup_output_device};
use crate::decoder::{spawn_stream_decoder, DecoderCmd, StreamStatus};
use crate::loader::Location;
use crate::params::{BackendKind, PlaybackParams};

const RING_CAPACITY: usize = 131_072;
/// How far playback moves between two `TimeUpdate` events.
const TIME_UPDATE_INTERVAL: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    CanPlay,
    Ended,
    Error(String),
    TimeUpdate,
}

/// A natively playable element: it is handed a URL and does its own
/// fetching, decoding and output.
pub trait MediaElement {
    fn open(&mut self, url: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn paused(&self) -> bool;
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    /// `NaN` before metadata arrives, `INFINITY` for live streams.
    fn duration(&self) -> f64;
    /// End of the range that can be sought into right now.
    fn seekable_end(&self) -> f64;
    fn set_volume(&mut self, level: f32);
    fn volume(&self) -> f32;
    fn set_playback_rate(&mut self, rate: f64);
    fn poll_event(&mut self) -> Option<MediaEvent>;
    /// Stops output and frees the underlying resources.
    fn release(&mut self);
}

/// Stands in before anything was loaded. Reports an error if asked to open
/// a resource, since it cannot play one.
#[derive(Debug)]
pub struct IdleElement {
    volume: f32,
    events: VecDeque<MediaEvent>,
}

impl Default for IdleElement {
    fn default() -> Self {
        Self {
            volume: 1.0,
            events: VecDeque::new(),
        }
    }
}

impl MediaElement for IdleElement {
    fn open(&mut self, url: &str) {
        self.events
            .push_back(MediaEvent::Error(format!("no media output for {url}")));
    }
    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn paused(&self) -> bool {
        true
    }
    fn current_time(&self) -> f64 {
        0.0
    }
    fn set_current_time(&mut self, _seconds: f64) {}
    fn duration(&self) -> f64 {
        0.0
    }
    fn seekable_end(&self) -> f64 {
        0.0
    }
    fn set_volume(&mut self, level: f32) {
        self.volume = level;
    }
    fn volume(&self) -> f32 {
        self.volume
    }
    fn set_playback_rate(&mut self, _rate: f64) {}
    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.events.pop_front()
    }
    fn release(&mut self) {
        self.events.clear();
    }
}

struct ActiveStream {
    _stream: Stream,
    _decoder_handle: JoinHandle<()>,
    cmd_tx: Sender<DecoderCmd>,
    status: Arc<StreamStatus>,
    is_playing: Arc<AtomicBool>,
}

/// Decode thread → ring buffer → cpal stream. Works for local files and,
/// through a read-only reqwest body, for http(s) streams.
pub struct StreamingElement {
    active: Option<ActiveStream>,
    volume: Arc<AtomicU32>,
    rate: Arc<AtomicU64>,
    events: VecDeque<MediaEvent>,
    reported_ready: bool,
    reported_error: bool,
    reported_end: bool,
    last_time_update: f64,
}

impl Default for StreamingElement {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingElement {
    pub fn new() -> Self {
        Self {
            active: None,
            volume: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            rate: Arc::new(AtomicU64::new(1.0f64.to_bits())),
            events: VecDeque::new(),
            reported_ready: false,
            reported_error: false,
            reported_end: false,
            last_time_update: 0.0,
        }
    }

    fn start(&mut self, url: &str) -> crate::error::Result<ActiveStream> {
        let location = Location::resolve(url, &std::env::current_dir()?)?;
        let output = setup_output_device()?;
        let channels = output.output_channels;
        let out_rate = output.output_sample_rate;

        let rb = HeapRb::<f32>::new(RING_CAPACITY);
        let (producer, mut consumer) = rb.split();
        let status = Arc::new(StreamStatus::default());
        let is_playing = Arc::new(AtomicBool::new(false));
        let rate = f64::from_bits(self.rate.load(Ordering::Relaxed));

        let (decoder_handle, cmd_tx) =
            spawn_stream_decoder(location, producer, status.clone(), channels, out_rate, rate);

        let cb_status = status.clone();
        let cb_playing = is_playing.clone();
        let cb_volume = self.volume.clone();
        let cb_rate = self.rate.clone();
        let stream = open_output_stream(&output, move |buf| {
            if cb_status.flushing.load(Ordering::Acquire) {
                consumer.clear();
                cb_status.drained.store(true, Ordering::Release);
                return;
            }
            if !cb_playing.load(Ordering::Relaxed) {
                return;
            }
            let vol = f32::from_bits(cb_volume.load(Ordering::Relaxed));
            let mut frames = 0usize;
            for frame in buf.chunks_exact_mut(channels) {
                let mut got = false;
                for slot in frame.iter_mut() {
                    if let Some(s) = consumer.try_pop() {
                        *slot = s * vol;
                        got = true;
                    }
                }
                if got {
                    frames += 1;
                } else if cb_status.eof.load(Ordering::Relaxed) {
                    cb_status.ended.store(true, Ordering::Relaxed);
                    break;
                }
            }
            let rate = f64::from_bits(cb_rate.load(Ordering::Relaxed));
            cb_status.advance(frames as f64 * rate / out_rate as f64);
        })?;

        Ok(ActiveStream {
            _stream: stream,
            _decoder_handle: decoder_handle,
            cmd_tx,
            status,
            is_playing,
        })
    }

    fn check_status(&mut self) {
        let Some(active) = &self.active else {
            return;
        };
        let status = &active.status;
        if status.failed.load(Ordering::Relaxed) && !self.reported_error {
            self.reported_error = true;
            self.events
                .push_back(MediaEvent::Error("stream decoder failed".into()));
        }
        if status.ready.load(Ordering::Acquire) && !self.reported_ready {
            self.reported_ready = true;
            self.events.push_back(MediaEvent::CanPlay);
        }
        let playing = active.is_playing.load(Ordering::Relaxed);
        if playing && status.ended.load(Ordering::Relaxed) && !self.reported_end {
            self.reported_end = true;
            active.is_playing.store(false, Ordering::Relaxed);
            self.events.push_back(MediaEvent::Ended);
        }
        let position = status.position();
        if playing && (position - self.last_time_update).abs() >= TIME_UPDATE_INTERVAL {
            self.last_time_update = position;
            self.events.push_back(MediaEvent::TimeUpdate);
        }
    }
}

impl MediaElement for StreamingElement {
    fn open(&mut self, url: &str) {
        self.release();
        match self.start(url) {
            Ok(active) => self.active = Some(active),
            Err(e) => {
                log::error!("cannot open {url}: {e}");
                self.reported_error = true;
                self.events.push_back(MediaEvent::Error(e.to_string()));
            }
        }
    }

    fn play(&mut self) {
        if self.active.is_none() {
            return;
        }
        if self.reported_end {
            // Playing again after the end starts over.
            self.set_current_time(0.0);
        }
        if let Some(active) = &self.active {
            active.is_playing.store(true, Ordering::Relaxed);
        }
    }

    fn pause(&mut self) {
        if let Some(active) = &self.active {
            active.is_playing.store(false, Ordering::Relaxed);
        }
    }

    fn paused(&self) -> bool {
        self.active
            .as_ref()
            .is_none_or(|a| !a.is_playing.load(Ordering::Relaxed))
    }

    fn current_time(&self) -> f64 {
        self.active.as_ref().map(|a| a.status.position()).unwrap_or(0.0)
    }

    fn set_current_time(&mut self, seconds: f64) {
        let Some(active) = &self.active else {
            return;
        };
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        active.status.flushing.store(true, Ordering::Release);
        active.status.set_position(seconds);
        active.status.ended.store(false, Ordering::Relaxed);
        if active
            .cmd_tx
            .send(DecoderCmd::Seek(Duration::from_secs_f64(seconds)))
            .is_err()
        {
            active.status.flushing.store(false, Ordering::Release);
        }
        self.last_time_update = seconds;
        self.reported_end = false;
    }

    fn duration(&self) -> f64 {
        self.active
            .as_ref()
            .map(|a| a.status.duration())
            .unwrap_or(f64::NAN)
    }

    fn seekable_end(&self) -> f64 {
        self.active
            .as_ref()
            .map(|a| a.status.seekable_end())
            .unwrap_or(0.0)
    }

    fn set_volume(&mut self, level: f32) {
        self.volume
            .store(level.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate.store(rate.to_bits(), Ordering::Relaxed);
        if let Some(active) = &self.active {
            let _ = active.cmd_tx.send(DecoderCmd::SetRate(rate));
        }
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.check_status();
        self.events.pop_front()
    }

    fn release(&mut self) {
        if let Some(active) = self.active.take() {
            active.is_playing.store(false, Ordering::Relaxed);
            let _ = active.cmd_tx.send(DecoderCmd::Stop);
        }
        self.events.clear();
        self.reported_ready = false;
        self.reported_error = false;
        self.reported_end = false;
        self.last_time_update = 0.0;
    }
}

impl Drop for StreamingElement {
    fn drop(&mut self) {
        self.release();
    }
}

/// Builds a fresh element for every load.
pub type ElementFactory = Box<dyn FnMut() -> Box<dyn MediaElement>>;

/// Hands transport to a [`MediaElement`]. It cannot decode, so peaks only
/// exist when the caller supplies them.
pub struct MediaElementBackend {
    factory: ElementFactory,
    element: Box<dyn MediaElement>,
    peaks: Option<Vec<f32>>,
    playback_rate: f64,
    volume: f32,
    pending: Vec<BackendEvent>,
    destroyed: bool,
}

impl MediaElementBackend {
    pub fn new(factory: ElementFactory, params: &PlaybackParams) -> Self {
        let mut backend = Self {
            factory,
            element: Box::new(IdleElement::default()),
            peaks: None,
            playback_rate: 1.0,
            volume: 1.0,
            pending: Vec::new(),
            destroyed: false,
        };
        backend.init(params);
        backend
    }
}

impl AudioBackend for MediaElementBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MediaElement
    }

    fn init(&mut self, params: &PlaybackParams) {
        self.playback_rate = sanitize_rate(params.audio_rate);
        self.element.set_playback_rate(self.playback_rate);
    }

    fn load(&mut self, source: AudioSource) {
        if self.destroyed {
            return;
        }
        match source {
            AudioSource::Media { url, peaks } => {
                self.element.release();
                self.element = (self.factory)();
                self.element.set_volume(self.volume);
                self.element.set_playback_rate(self.playback_rate);
                self.element.open(&url);
                self.peaks = peaks;
            }
            AudioSource::Encoded { .. } | AudioSource::Decoded(_) => {
                log::warn!("media element backend only plays urls");
                self.pending
                    .push(BackendEvent::Error("Error loading media element".into()));
            }
        }
    }

    fn poll(&mut self) -> Vec<BackendEvent> {
        if self.destroyed {
            return Vec::new();
        }
        while let Some(event) = self.element.poll_event() {
            let mapped = match event {
                MediaEvent::CanPlay => BackendEvent::CanPlay,
                MediaEvent::Ended => BackendEvent::Finish,
                MediaEvent::TimeUpdate => BackendEvent::AudioProcess(self.element.current_time()),
                MediaEvent::Error(detail) => {
                    log::error!("media element: {detail}");
                    BackendEvent::Error("Error loading media element".into())
                }
            };
            self.pending.push(mapped);
        }
        std::mem::take(&mut self.pending)
    }

    fn play(&mut self, start: Option<f64>, end: Option<f64>) {
        self.seek_to(start, end);
        self.element.play();
    }

    fn pause(&mut self) {
        self.element.pause();
    }

    fn is_paused(&self) -> bool {
        self.element.paused()
    }

    fn current_time(&self) -> f64 {
        self.element.current_time()
    }

    fn duration(&self) -> f64 {
        let duration = self.element.duration();
        if duration.is_infinite() {
            self.element.seekable_end()
        } else {
            duration
        }
    }

    fn played_fraction(&self) -> f64 {
        let fraction = self.current_time() / self.duration();
        if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn seek_to(&mut self, start: Option<f64>, _end: Option<f64>) {
        if let Some(start) = start {
            self.element.set_current_time(start);
        }
    }

    fn set_volume(&mut self, level: f32) {
        self.volume = level;
        self.element.set_volume(level);
    }

    fn volume(&self) -> f32 {
        self.element.volume()
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = sanitize_rate(rate);
        if self.is_paused() {
            self.element.set_playback_rate(self.playback_rate);
        } else {
            let position = self.current_time();
            self.element.pause();
            self.element.set_playback_rate(self.playback_rate);
            self.element.set_current_time(position);
            self.element.play();
        }
    }

    fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    fn peaks(&self, _length: usize) -> Vec<f32> {
        self.peaks.clone().unwrap_or_default()
    }

    fn disconnect_source(&mut self) {}

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.element.pause();
        self.element.release();
        self.element = Box::new(IdleElement::default());
        self.peaks = None;
        self.pending.clear();
        self.destroyed = true;
    }
}
