// src/backend/mod.rs

pub mod graph;
pub mod media_element;
pub mod sample_accurate;

use crate::decoder::DecodedAudio;
use crate::error::Result;
use crate::params::{BackendKind, PlaybackParams};

pub use graph::{AudioGraph, CpalGraph, FilterKind, FilterSpec, OfflineGraph, OfflineHandle};
pub use media_element::{
    ElementFactory, IdleElement, MediaElement, MediaElementBackend, MediaEvent, StreamingElement,
};
pub use sample_accurate::{PlaybackState, SampleAccurateBackend};

/// What a backend is asked to play. Replaced wholesale on every load.
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// A complete encoded file, decoded up front.
    Encoded {
        bytes: Vec<u8>,
        extension: Option<String>,
    },
    Decoded(DecodedAudio),
    /// Something the media element plays natively, with optional peaks.
    Media { url: String, peaks: Option<Vec<f32>> },
}

/// Raised by a backend while polled.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// The loaded source is playable.
    CanPlay,
    AudioProcess(f64),
    Finish,
    Error(String),
}

/// The transport contract both engines implement.
pub trait AudioBackend {
    fn kind(&self) -> BackendKind;

    /// Applies the parts of `params` the backend cares about.
    fn init(&mut self, params: &PlaybackParams);

    fn load(&mut self, source: AudioSource);

    /// Forgets a load that has not reported back yet.
    fn cancel_load(&mut self) {}

    /// Drives background work and returns what happened since the last
    /// call. Called once per tick.
    fn poll(&mut self) -> Vec<BackendEvent>;

    fn play(&mut self, start: Option<f64>, end: Option<f64>);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    /// Seconds.
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;

    /// Always within `0.0..=1.0`.
    fn played_fraction(&self) -> f64;

    fn seek_to(&mut self, start: Option<f64>, end: Option<f64>);

    fn set_volume(&mut self, level: f32);
    fn volume(&self) -> f32;

    fn set_playback_rate(&mut self, rate: f64);
    fn playback_rate(&self) -> f64;

    fn peaks(&self, length: usize) -> Vec<f32>;

    /// Silences the current playback unit without touching state.
    fn disconnect_source(&mut self);

    fn set_filters(&mut self, _filters: &[FilterSpec]) {}

    fn analyser_time_domain(&self) -> Vec<u8> {
        Vec::new()
    }

    fn analyser_frequency(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Leaves the backend inert; later calls are harmless no-ops.
    fn destroy(&mut self);
}

/// Turns a rate of 0 or NaN into 1.
pub(crate) fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_nan() || rate == 0.0 { 1.0 } else { rate }
}

/// The host the player runs on.
pub trait Platform {
    /// Fails with `PlayerError::Capability` when no sample-accurate graph
    /// can run here.
    fn create_graph(&self) -> Result<Box<dyn AudioGraph>>;

    fn create_media_element(&self) -> Box<dyn MediaElement>;
}

/// Default output device through cpal, streaming element for media.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopPlatform;

impl Platform for DesktopPlatform {
    fn create_graph(&self) -> Result<Box<dyn AudioGraph>> {
        Ok(Box::new(CpalGraph::new()?))
    }

    fn create_media_element(&self) -> Box<dyn MediaElement> {
        Box::new(StreamingElement::new())
    }
}

/// No device at all. The graph is offline and only advances when the
/// handle from [`HeadlessPlatform::clock`] renders.
pub struct HeadlessPlatform {
    clock: OfflineHandle,
}

impl HeadlessPlatform {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        let (_, clock) = OfflineGraph::new(sample_rate, channels);
        Self { clock }
    }

    pub fn clock(&self) -> OfflineHandle {
        self.clock.clone()
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new(44_100, 2)
    }
}

impl Platform for HeadlessPlatform {
    fn create_graph(&self) -> Result<Box<dyn AudioGraph>> {
        Ok(Box::new(OfflineGraph::from_handle(&self.clock)))
    }

    fn create_media_element(&self) -> Box<dyn MediaElement> {
        Box::new(IdleElement::default())
    }
}
