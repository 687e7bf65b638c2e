// src/backend/sample_accurate.rs

use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use super::graph::{AudioGraph, FilterSpec, RunningSource};
use super::{sanitize_rate, AudioBackend, AudioSource, BackendEvent};
use crate::decoder::{decode_bytes, DecodedAudio};
use crate::params::{BackendKind, PlaybackParams};
use crate::peaks::{extract_peaks, DEFAULT_STEP_DIVISOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Finished,
}

type DecodeResult = Result<DecodedAudio, String>;

/// Decodes the whole clip into memory and plays it through an
/// [`AudioGraph`]. Every transition into `Playing` starts a fresh source
/// node; position is tracked against the graph clock, not the node.
pub struct SampleAccurateBackend {
    graph: Box<dyn AudioGraph>,
    buffer: Option<Arc<DecodedAudio>>,
    state: PlaybackState,
    /// Graph time of the last play or seek.
    last_play: f64,
    /// Clip position at `last_play`.
    start_position: f64,
    playback_rate: f64,
    peak_step_divisor: usize,
    source: Option<RunningSource>,
    decode_rx: Option<Receiver<DecodeResult>>,
    pending: Vec<BackendEvent>,
    destroyed: bool,
}

impl SampleAccurateBackend {
    pub fn new(graph: Box<dyn AudioGraph>, params: &PlaybackParams) -> Self {
        let mut backend = Self {
            last_play: graph.current_time(),
            graph,
            buffer: None,
            state: PlaybackState::Paused,
            start_position: 0.0,
            playback_rate: 1.0,
            peak_step_divisor: DEFAULT_STEP_DIVISOR,
            source: None,
            decode_rx: None,
            pending: Vec::new(),
            destroyed: false,
        };
        backend.init(params);
        backend
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn buffer(&self) -> Option<&DecodedAudio> {
        self.buffer.as_deref()
    }

    /// Returns true when the state actually changed. Entering `Finished`
    /// queues the finish event.
    fn set_state(&mut self, state: PlaybackState) -> bool {
        if self.state == state {
            return false;
        }
        log::debug!("playback state {:?} -> {:?}", self.state, state);
        self.state = state;
        if state == PlaybackState::Finished {
            self.pending.push(BackendEvent::Finish);
        }
        true
    }

    fn played_time(&self) -> f64 {
        (self.graph.current_time() - self.last_play) * self.playback_rate
    }

    fn install(&mut self, audio: DecodedAudio) {
        let audio = if audio.sample_rate != self.graph.sample_rate() {
            match audio.resampled(self.graph.sample_rate()) {
                Ok(a) => a,
                Err(e) => {
                    self.pending
                        .push(BackendEvent::Error(format!("Error decoding audiobuffer: {e}")));
                    return;
                }
            }
        } else {
            audio
        };
        log::info!(
            "decoded {:.2}s, {} channel(s) at {} Hz",
            audio.duration(),
            audio.channel_count(),
            audio.sample_rate
        );
        self.disconnect_source();
        self.state = PlaybackState::Paused;
        self.start_position = 0.0;
        self.last_play = self.graph.current_time();
        self.buffer = Some(Arc::new(audio));
        self.pending.push(BackendEvent::CanPlay);
    }

    /// Resolves missing bounds and moves the reference point.
    fn adjust(&mut self, start: Option<f64>, end: Option<f64>) -> (f64, f64) {
        let duration = self.duration();
        let start = start.unwrap_or_else(|| {
            let t = self.current_time();
            if t >= duration { 0.0 } else { t }
        });
        let end = end.unwrap_or(duration);

        self.start_position = start;
        self.last_play = self.graph.current_time();
        if self.state == PlaybackState::Finished {
            self.set_state(PlaybackState::Paused);
        }
        (start, end)
    }
}

impl AudioBackend for SampleAccurateBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SampleAccurate
    }

    fn init(&mut self, params: &PlaybackParams) {
        self.peak_step_divisor = params.peak_step_divisor.max(1);
        self.set_playback_rate(params.audio_rate);
    }

    fn load(&mut self, source: AudioSource) {
        if self.destroyed {
            return;
        }
        match source {
            AudioSource::Encoded { bytes, extension } => {
                let target_rate = self.graph.sample_rate();
                let (tx, rx) = channel();
                // Replacing the receiver drops whatever an older decode sends.
                self.decode_rx = Some(rx);
                thread::spawn(move || {
                    let result = decode_bytes(bytes, extension.as_deref())
                        .and_then(|audio| audio.resampled(target_rate))
                        .map_err(|e| format!("{e:#}"));
                    let _ = tx.send(result);
                });
            }
            AudioSource::Decoded(audio) => {
                self.decode_rx = None;
                self.install(audio);
            }
            AudioSource::Media { url, .. } => {
                log::warn!("sample-accurate backend cannot stream {url}");
                self.pending.push(BackendEvent::Error(format!(
                    "Error decoding audiobuffer: {url} is not decoded audio"
                )));
            }
        }
    }

    fn cancel_load(&mut self) {
        self.decode_rx = None;
    }

    fn poll(&mut self) -> Vec<BackendEvent> {
        if self.destroyed {
            return Vec::new();
        }

        if let Some(rx) = &self.decode_rx {
            match rx.try_recv() {
                Ok(Ok(audio)) => {
                    self.decode_rx = None;
                    self.install(audio);
                }
                Ok(Err(e)) => {
                    self.decode_rx = None;
                    self.pending
                        .push(BackendEvent::Error(format!("Error decoding audiobuffer: {e}")));
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.decode_rx = None;
                    self.pending.push(BackendEvent::Error(
                        "Error decoding audiobuffer: decoder exited".into(),
                    ));
                }
            }
        }

        let time = self.current_time();
        if self.state == PlaybackState::Playing {
            self.pending.push(BackendEvent::AudioProcess(time));
        }
        if self.buffer.is_some() && time > self.duration() && self.set_state(PlaybackState::Finished)
        {
            self.disconnect_source();
        }

        std::mem::take(&mut self.pending)
    }

    fn play(&mut self, start: Option<f64>, end: Option<f64>) {
        let Some(buffer) = self.buffer.clone() else {
            log::debug!("play ignored: nothing loaded");
            return;
        };
        self.disconnect_source();
        let mut node = self.graph.create_source(buffer, self.playback_rate);
        self.graph.connect(&mut node);

        let (start, end) = self.adjust(start, end);
        self.source = Some(node.start(start, end - start));
        self.set_state(PlaybackState::Playing);
    }

    fn pause(&mut self) {
        match self.state {
            PlaybackState::Playing => self.start_position += self.played_time(),
            PlaybackState::Finished => self.start_position = self.duration(),
            PlaybackState::Paused => {}
        }
        self.last_play = self.graph.current_time();
        self.disconnect_source();
        self.set_state(PlaybackState::Paused);
    }

    fn is_paused(&self) -> bool {
        self.state != PlaybackState::Playing
    }

    fn current_time(&self) -> f64 {
        match self.state {
            PlaybackState::Playing => self.start_position + self.played_time(),
            PlaybackState::Paused => self.start_position,
            PlaybackState::Finished => self.duration(),
        }
    }

    fn duration(&self) -> f64 {
        self.buffer.as_ref().map(|b| b.duration()).unwrap_or(0.0)
    }

    fn played_fraction(&self) -> f64 {
        if self.state == PlaybackState::Finished {
            return 1.0;
        }
        let fraction = self.current_time() / self.duration();
        if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn seek_to(&mut self, start: Option<f64>, end: Option<f64>) {
        self.adjust(start, end);
    }

    fn set_volume(&mut self, level: f32) {
        self.graph.set_gain(level);
    }

    fn volume(&self) -> f32 {
        self.graph.gain()
    }

    /// The rate is fixed per source node, so a playing clip is paused and
    /// restarted from the same position.
    fn set_playback_rate(&mut self, rate: f64) {
        let rate = sanitize_rate(rate);
        if self.is_paused() {
            self.playback_rate = rate;
        } else {
            self.pause();
            self.playback_rate = rate;
            self.play(None, None);
        }
    }

    fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    fn peaks(&self, length: usize) -> Vec<f32> {
        self.buffer
            .as_ref()
            .map(|b| extract_peaks(&b.channels, length, self.peak_step_divisor))
            .unwrap_or_default()
    }

    fn disconnect_source(&mut self) {
        if let Some(source) = self.source.take() {
            source.stop();
        }
    }

    fn set_filters(&mut self, filters: &[FilterSpec]) {
        self.graph.set_filters(filters);
    }

    fn analyser_time_domain(&self) -> Vec<u8> {
        self.graph.analyser_time_domain()
    }

    fn analyser_frequency(&self) -> Vec<u8> {
        self.graph.analyser_frequency()
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        if !self.is_paused() {
            self.pause();
        }
        self.buffer = None;
        self.decode_rx = None;
        self.pending.clear();
        self.disconnect_source();
        self.graph.set_filters(&[]);
        self.graph.close();
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::graph::{OfflineGraph, OfflineHandle};
    use std::time::{Duration, Instant};

    const RATE: u32 = 1_000;

    fn backend() -> (SampleAccurateBackend, OfflineHandle) {
        let (graph, clock) = OfflineGraph::new(RATE, 1);
        (SampleAccurateBackend::new(Box::new(graph), &PlaybackParams::default()), clock)
    }

    fn loaded(seconds: usize) -> (SampleAccurateBackend, OfflineHandle) {
        let (mut b, clock) = backend();
        b.load(AudioSource::Decoded(DecodedAudio::new(RATE, vec![vec![0.25; RATE as usize * seconds]])));
        assert_eq!(b.poll(), vec![BackendEvent::CanPlay]);
        (b, clock)
    }

    fn poll_until_quiet(b: &mut SampleAccurateBackend) -> Vec<BackendEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let events = b.poll();
            if !events.is_empty() || Instant::now() > deadline {
                return events;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn position_follows_graph_clock() {
        let (mut b, clock) = loaded(10);
        b.play(None, None);
        clock.advance(3.0);
        assert!((b.current_time() - 3.0).abs() < 1e-6);
        b.pause();
        clock.advance(2.0);
        assert!((b.current_time() - 3.0).abs() < 1e-6);
        assert!((b.played_fraction() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn finishes_exactly_once() {
        let (mut b, clock) = loaded(2);
        b.play(None, None);
        clock.advance(2.5);
        let events = b.poll();
        assert_eq!(events.iter().filter(|e| **e == BackendEvent::Finish).count(), 1);
        assert_eq!(b.state(), PlaybackState::Finished);
        assert_eq!(b.played_fraction(), 1.0);

        clock.advance(1.0);
        assert!(!b.poll().contains(&BackendEvent::Finish));
        assert_eq!(b.current_time(), 2.0);
    }

    #[test]
    fn seeking_out_of_finished_pauses() {
        let (mut b, clock) = loaded(2);
        b.play(None, None);
        clock.advance(3.0);
        b.poll();
        b.seek_to(Some(0.5), None);
        assert_eq!(b.state(), PlaybackState::Paused);
        assert!((b.current_time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn play_after_finish_restarts_from_zero() {
        let (mut b, clock) = loaded(1);
        b.play(None, None);
        clock.advance(1.5);
        b.poll();
        b.play(None, None);
        assert!(b.current_time() < 1e-9);
        assert!(!b.is_paused());
    }

    #[test]
    fn rate_change_keeps_position() {
        let (mut b, clock) = loaded(10);
        b.play(None, None);
        clock.advance(2.0);
        b.set_playback_rate(2.0);
        assert!((b.current_time() - 2.0).abs() < 1e-6);
        clock.advance(1.0);
        assert!((b.current_time() - 4.0).abs() < 1e-6);
        b.set_playback_rate(f64::NAN);
        assert_eq!(b.playback_rate(), 1.0);
    }

    #[test]
    fn audio_process_only_while_playing() {
        let (mut b, clock) = loaded(5);
        assert!(b.poll().is_empty());
        b.play(None, None);
        clock.advance(1.0);
        assert!(matches!(b.poll().as_slice(), [BackendEvent::AudioProcess(t)] if (t - 1.0).abs() < 1e-6));
    }

    #[test]
    fn superseded_decode_is_dropped() {
        let (mut b, _clock) = backend();
        b.load(AudioSource::Encoded {
            bytes: b"not audio".to_vec(),
            extension: None,
        });
        b.load(AudioSource::Decoded(DecodedAudio::new(RATE, vec![vec![0.1; 500]])));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(b.poll(), vec![BackendEvent::CanPlay]);
        assert!(b.poll().is_empty());
    }

    #[test]
    fn decode_failure_is_reported() {
        let (mut b, _clock) = backend();
        b.load(AudioSource::Encoded {
            bytes: b"not audio".to_vec(),
            extension: Some("wav".into()),
        });
        match poll_until_quiet(&mut b).as_slice() {
            [BackendEvent::Error(msg)] => assert!(msg.starts_with("Error decoding audiobuffer")),
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn destroy_is_idempotent_and_inert() {
        let (mut b, clock) = loaded(3);
        b.play(None, None);
        b.destroy();
        b.destroy();
        assert!(b.is_paused());
        assert!(clock.is_closed());
        b.play(None, None);
        assert!(b.poll().is_empty());
        assert!(b.peaks(10).is_empty());
    }
}
