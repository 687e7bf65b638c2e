// src/controller.rs

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::backend::{
    AudioBackend, AudioSource, BackendEvent, ElementFactory, FilterSpec, MediaElementBackend,
    Platform, SampleAccurateBackend,
};
use crate::decoder::DecodedAudio;
use crate::error::Result;
use crate::events::{EventBus, HandlerId, PlayerEvent};
use crate::loader::{percent, LoaderMsg, ResourceLoader};
use crate::params::{BackendKind, PlaybackParams};
use crate::peaks::export_json;
use crate::render::{RenderEvent, Renderer};
use crate::session::SessionConfig;

const EXPORT_LENGTH: usize = 1024;
const EXPORT_ACCURACY: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Empty,
    Loading,
    Ready,
    /// The last load reported an error.
    Failed,
}

/// Player calls that can be queued from inside event handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load(String),
    Play,
    Pause,
    PlayPause,
    Stop,
    SeekTo(f64),
    SeekAndCenter(f64),
    SkipForward(Option<f64>),
    SkipBackward(Option<f64>),
    SetVolume(f32),
    SetPlaybackRate(f64),
    ToggleMute,
    Destroy,
    /// Re-raised as `PlayerEvent::Scroll`.
    Scrolled(f64),
}

/// Cloneable handle for queueing [`Command`]s. Commands are applied at the
/// start of the next `Player::tick`.
#[derive(Debug, Clone)]
pub struct CommandSender(Sender<Command>);

impl CommandSender {
    pub fn send(&self, command: Command) {
        if self.0.send(command).is_err() {
            log::debug!("player dropped, command ignored");
        }
    }
}

/// Owns one backend and one renderer and keeps them in step.
///
/// Nothing here runs on its own: the owner calls [`Player::tick`] once per
/// display frame, and that is where fetch, decode and device results are
/// picked up and events are raised.
pub struct Player {
    params: PlaybackParams,
    backend: Box<dyn AudioBackend>,
    renderer: Renderer,
    bus: EventBus<PlayerEvent>,
    loader: ResourceLoader,
    session: SessionConfig,
    commands_tx: Sender<Command>,
    commands_rx: Receiver<Command>,
    /// Bumped by every load and by destroy.
    generation: u64,
    load_state: LoadState,
    loading_progress: Option<u8>,
    /// The backend was handed the current clip and has not answered yet.
    awaiting_backend: bool,
    animating: bool,
    destroyed: bool,
}

impl Player {
    /// Fails only when the container is missing or the params are invalid.
    /// A backend that cannot run here is replaced by the media element one.
    pub fn new(params: PlaybackParams, platform: Rc<dyn Platform>) -> Result<Self> {
        params.validate()?;
        let mut params = params;
        let mut renderer = Renderer::new(&params)?;
        let backend = create_backend(&mut params, &platform);

        let (commands_tx, commands_rx) = channel();
        let clicks = CommandSender(commands_tx.clone());
        renderer.bus().on("click", move |e: &RenderEvent| {
            if let RenderEvent::Click(fraction) = e {
                clicks.send(Command::SeekTo(*fraction));
            }
        });
        let scrolls = CommandSender(commands_tx.clone());
        renderer.bus().on("scroll", move |e: &RenderEvent| {
            if let RenderEvent::Scroll(left) = e {
                scrolls.send(Command::Scrolled(*left));
            }
        });

        let mut player = Self {
            params,
            backend,
            renderer,
            bus: EventBus::new(),
            loader: ResourceLoader::new("."),
            session: SessionConfig::default(),
            commands_tx,
            commands_rx,
            generation: 0,
            load_state: LoadState::Empty,
            loading_progress: None,
            awaiting_backend: false,
            animating: false,
            destroyed: false,
        };
        player.backend.set_volume(player.session.effective_volume());
        Ok(player)
    }

    pub fn on<F>(&mut self, name: &'static str, handler: F) -> HandlerId
    where
        F: FnMut(&PlayerEvent) + 'static,
    {
        self.bus.on(name, handler)
    }

    pub fn once<F>(&mut self, name: &'static str, handler: F) -> HandlerId
    where
        F: FnMut(&PlayerEvent) + 'static,
    {
        self.bus.once(name, handler)
    }

    pub fn off(&mut self, name: &'static str, id: Option<HandlerId>) {
        self.bus.off(name, id);
    }

    pub fn commands(&self) -> CommandSender {
        CommandSender(self.commands_tx.clone())
    }

    fn emit(&mut self, event: PlayerEvent) {
        log::trace!("event: {event:?}");
        self.bus.emit(&event);
    }

    pub fn params(&self) -> &PlaybackParams {
        &self.params
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    /// Download percentage while a fetch is running, `None` otherwise.
    pub fn loading_progress(&self) -> Option<u8> {
        self.loading_progress
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Relative catalog paths are resolved against this directory.
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.loader.set_base_dir(dir);
    }

    // ---------- loading ----------

    fn begin_load(&mut self) {
        self.empty();
        self.backend.cancel_load();
        self.generation += 1;
        self.load_state = LoadState::Loading;
        self.loading_progress = None;
        self.awaiting_backend = false;
    }

    pub fn load(&mut self, path: &str) {
        self.load_with_peaks(path, None);
    }

    /// Supplied peaks are only used by the media element backend; the
    /// sample-accurate one computes its own.
    pub fn load_with_peaks(&mut self, path: &str, peaks: Option<Vec<f32>>) {
        if self.destroyed {
            return;
        }
        self.begin_load();
        match self.backend.kind() {
            BackendKind::SampleAccurate => {
                self.loading_progress = Some(0);
                self.loader.fetch(path, self.generation);
            }
            BackendKind::MediaElement => match self.loader.resolve(path) {
                Ok(location) => {
                    self.awaiting_backend = true;
                    self.backend.load(AudioSource::Media {
                        url: location.to_string(),
                        peaks,
                    });
                }
                Err(e) => self.fail(e.to_string()),
            },
        }
    }

    /// Encoded bytes already in memory.
    pub fn load_bytes(&mut self, bytes: Vec<u8>, extension: Option<&str>) {
        if self.destroyed {
            return;
        }
        self.begin_load();
        self.awaiting_backend = true;
        self.backend.load(AudioSource::Encoded {
            bytes,
            extension: extension.map(str::to_owned),
        });
    }

    pub fn load_decoded(&mut self, audio: DecodedAudio) {
        if self.destroyed {
            return;
        }
        self.begin_load();
        self.awaiting_backend = true;
        self.backend.load(AudioSource::Decoded(audio));
    }

    /// Stops playback and shows an empty waveform.
    fn empty(&mut self) {
        if !self.backend.is_paused() {
            self.stop();
            self.backend.disconnect_source();
        }
        self.renderer.progress(0.0);
        self.renderer.set_width(0);
        self.renderer.draw_peaks(&[], 0);
    }

    fn fail(&mut self, message: String) {
        log::error!("{message}");
        self.awaiting_backend = false;
        self.loading_progress = None;
        if self.load_state == LoadState::Loading {
            self.load_state = LoadState::Failed;
        }
        self.emit(PlayerEvent::Error(message));
    }

    // ---------- the frame loop ----------

    /// One cooperative step: one-shot cleanup, queued commands, fetch
    /// results, backend events, then one animation frame.
    pub fn tick(&mut self) {
        if self.destroyed {
            return;
        }
        self.bus.flush();
        self.renderer.bus().flush();

        let queued: Vec<Command> = self.commands_rx.try_iter().collect();
        for command in queued {
            self.apply(command);
            if self.destroyed {
                return;
            }
        }

        self.drain_loader();
        self.poll_backend();
        self.animation_frame();
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Load(path) => self.load(&path),
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::PlayPause => self.play_pause(),
            Command::Stop => self.stop(),
            Command::SeekTo(f) => self.seek_to(f),
            Command::SeekAndCenter(f) => self.seek_and_center(f),
            Command::SkipForward(s) => self.skip_forward(s),
            Command::SkipBackward(s) => self.skip_backward(s),
            Command::SetVolume(v) => self.set_volume(v),
            Command::SetPlaybackRate(r) => self.set_playback_rate(r),
            Command::ToggleMute => self.toggle_mute(),
            Command::Destroy => self.destroy(),
            Command::Scrolled(left) => self.emit(PlayerEvent::Scroll(left)),
        }
    }

    fn drain_loader(&mut self) {
        while let Some(msg) = self.loader.try_recv() {
            if msg.generation() != self.generation {
                log::debug!("dropping loader result of generation {}", msg.generation());
                continue;
            }
            match msg {
                LoaderMsg::Progress { loaded, total, .. } => {
                    let p = percent(loaded, total);
                    self.loading_progress = Some(p);
                    self.emit(PlayerEvent::Loading(p));
                }
                LoaderMsg::Done {
                    bytes, extension, ..
                } => {
                    log::info!("fetched {} bytes, decoding", bytes.len());
                    self.awaiting_backend = true;
                    self.backend.load(AudioSource::Encoded { bytes, extension });
                }
                LoaderMsg::Failed { error, .. } => self.fail(error.to_string()),
            }
        }
    }

    fn poll_backend(&mut self) {
        for event in self.backend.poll() {
            match event {
                BackendEvent::CanPlay => {
                    if !self.awaiting_backend {
                        continue;
                    }
                    self.awaiting_backend = false;
                    self.loading_progress = None;
                    self.load_state = LoadState::Ready;
                    self.draw_buffer();
                    self.emit(PlayerEvent::Ready);
                    if self.session.autoplay {
                        self.play();
                    }
                }
                BackendEvent::AudioProcess(time) => self.emit(PlayerEvent::AudioProcess(time)),
                BackendEvent::Finish => {
                    self.renderer.progress(self.backend.played_fraction());
                    self.emit(PlayerEvent::Finish);
                    if self.session.repeat {
                        self.seek_to(0.0);
                        self.play();
                    }
                }
                BackendEvent::Error(message) => self.fail(message),
            }
        }
    }

    /// Pushes the played fraction to the renderer; stops itself once the
    /// backend is paused.
    fn animation_frame(&mut self) {
        if !self.animating {
            return;
        }
        if self.backend.is_paused() {
            self.animating = false;
            return;
        }
        self.renderer.progress(self.backend.played_fraction());
    }

    // ---------- transport ----------

    pub fn play(&mut self) {
        self.play_range(None, None);
    }

    /// Seconds. Missing bounds mean "from the current position" and "to the
    /// end".
    pub fn play_range(&mut self, start: Option<f64>, end: Option<f64>) {
        if self.destroyed || self.load_state != LoadState::Ready {
            log::debug!("play ignored in state {:?}", self.load_state);
            return;
        }
        self.backend.play(start, end);
        self.animating = true;
        self.animation_frame();
        self.emit(PlayerEvent::Play);
    }

    /// No-op, and no event, when already paused.
    pub fn pause(&mut self) {
        if self.destroyed || self.backend.is_paused() {
            return;
        }
        self.backend.pause();
        self.emit(PlayerEvent::Pause);
    }

    pub fn play_pause(&mut self) {
        if self.backend.is_paused() {
            self.play();
        } else {
            self.pause();
        }
    }

    pub fn stop(&mut self) {
        if self.destroyed {
            return;
        }
        self.pause();
        self.seek_to(0.0);
        self.renderer.progress(0.0);
    }

    pub fn seek_to(&mut self, fraction: f64) {
        if self.destroyed {
            return;
        }
        let fraction = clamp_fraction(fraction);
        let paused = self.backend.is_paused();
        // No small scrolls while seeking stopped.
        if paused {
            self.renderer.set_scroll_parent(false);
        }
        let duration = self.backend.duration();
        self.backend.seek_to(Some(fraction * duration), None);
        self.renderer.progress(self.backend.played_fraction());

        if !paused {
            // A running source cannot be moved.
            self.backend.pause();
            self.backend.play(None, None);
        }
        self.renderer.set_scroll_parent(self.params.scroll_parent);
        self.emit(PlayerEvent::Seek(fraction));
    }

    pub fn seek_and_center(&mut self, fraction: f64) {
        let fraction = clamp_fraction(fraction);
        self.seek_to(fraction);
        self.renderer.recenter(fraction);
    }

    /// Seconds; `None`, 0 or a non-finite value means the configured skip
    /// length.
    pub fn skip_forward(&mut self, seconds: Option<f64>) {
        let seconds = self.skip_seconds(seconds);
        self.skip(seconds);
    }

    pub fn skip_backward(&mut self, seconds: Option<f64>) {
        let seconds = self.skip_seconds(seconds);
        self.skip(-seconds);
    }

    fn skip_seconds(&self, seconds: Option<f64>) -> f64 {
        seconds
            .filter(|s| s.is_finite() && *s != 0.0)
            .unwrap_or(self.params.skip_length)
    }

    pub fn skip(&mut self, offset: f64) {
        if !offset.is_finite() {
            return;
        }
        let position = self.current_time();
        let position = if position.is_nan() { 0.0 } else { position };
        let duration = self.duration();
        let duration = if duration.is_nan() || duration == 0.0 {
            1.0
        } else {
            duration
        };
        let position = (position + offset).clamp(0.0, duration);
        self.seek_and_center(position / duration);
    }

    // ---------- levels ----------

    /// 0..=1. Also clears mute.
    pub fn set_volume(&mut self, level: f32) {
        self.session.volume = level;
        self.session.muted = false;
        self.session = std::mem::take(&mut self.session).sanitized();
        self.backend.set_volume(self.session.effective_volume());
    }

    /// The level last set, before mute and ducking.
    pub fn volume(&self) -> f32 {
        self.session.volume
    }

    pub fn toggle_mute(&mut self) {
        self.session.muted = !self.session.muted;
        self.backend.set_volume(self.session.effective_volume());
    }

    pub fn is_muted(&self) -> bool {
        self.session.muted
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.backend.set_playback_rate(rate);
        self.session.playback_rate = self.backend.playback_rate();
    }

    pub fn playback_rate(&self) -> f64 {
        self.backend.playback_rate()
    }

    pub fn set_filters(&mut self, filters: &[FilterSpec]) {
        self.backend.set_filters(filters);
    }

    pub fn analyser_time_domain(&self) -> Vec<u8> {
        self.backend.analyser_time_domain()
    }

    pub fn analyser_frequency(&self) -> Vec<u8> {
        self.backend.analyser_frequency()
    }

    /// Applies volume, mute, rate and the repeat/autoplay flags.
    pub fn apply_session(&mut self, session: SessionConfig) {
        self.session = session.sanitized();
        self.backend.set_volume(self.session.effective_volume());
        self.backend.set_playback_rate(self.session.playback_rate);
        self.session.playback_rate = self.backend.playback_rate();
    }

    pub fn session(&self) -> SessionConfig {
        self.session.clone()
    }

    // ---------- queries ----------

    pub fn current_time(&self) -> f64 {
        self.backend.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.backend.duration()
    }

    pub fn played_fraction(&self) -> f64 {
        self.backend.played_fraction()
    }

    pub fn is_playing(&self) -> bool {
        !self.backend.is_paused()
    }

    // ---------- drawing ----------

    fn draw_buffer(&mut self) {
        let nominal =
            (self.backend.duration() * self.params.min_px_per_sec * self.params.pixel_ratio).round();
        let nominal = if nominal.is_finite() && nominal > 0.0 {
            nominal as u32
        } else {
            0
        };
        let parent = self.renderer.parent_width();
        let width = if self.params.fill_parent && (!self.params.scroll_parent || nominal < parent)
        {
            parent
        } else {
            nominal
        };

        let peaks = self.backend.peaks(width as usize);
        self.renderer.draw_peaks(&peaks, width);
        self.emit(PlayerEvent::Redraw { width });
    }

    /// New container width in css px; redraws a loaded clip.
    pub fn resize(&mut self, container_width: u32) {
        if self.destroyed {
            return;
        }
        self.renderer.set_container_width(container_width);
        if self.load_state == LoadState::Ready {
            self.draw_buffer();
            self.renderer.progress(self.backend.played_fraction());
        }
    }

    pub fn toggle_scroll(&mut self) {
        self.params.scroll_parent = !self.params.scroll_parent;
        self.renderer.set_scroll_parent(self.params.scroll_parent);
        if self.load_state == LoadState::Ready {
            self.draw_buffer();
        }
    }

    pub fn toggle_interaction(&mut self) {
        self.params.interact = !self.params.interact;
        self.renderer.set_interact(self.params.interact);
    }

    /// Pointer input. The resulting seek is applied on the next tick.
    pub fn click(&mut self, x: f64, y: f64) -> Option<f64> {
        self.renderer.click(x, y)
    }

    /// Peaks rounded to `1 / accuracy`, as a JSON array.
    pub fn export_peaks(&self, length: Option<usize>, accuracy: Option<u32>) -> String {
        let length = length.filter(|l| *l > 0).unwrap_or(EXPORT_LENGTH);
        let accuracy = accuracy.filter(|a| *a > 0).unwrap_or(EXPORT_ACCURACY);
        export_json(&self.backend.peaks(length), accuracy)
    }

    /// Safe to call more than once, and with nothing loaded.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.emit(PlayerEvent::Destroy);
        self.bus.off_all();
        self.backend.destroy();
        self.renderer.destroy();
        self.generation += 1;
        self.load_state = LoadState::Empty;
        self.loading_progress = None;
        self.awaiting_backend = false;
        self.animating = false;
        self.destroyed = true;
        log::info!("player destroyed");
    }
}

/// Builds the backend `params` asks for. A sample-accurate graph that cannot
/// be created falls back to the media element once, and `params.backend` is
/// updated to say so.
fn create_backend(params: &mut PlaybackParams, platform: &Rc<dyn Platform>) -> Box<dyn AudioBackend> {
    match params.backend {
        BackendKind::SampleAccurate => match platform.create_graph() {
            Ok(graph) => Box::new(SampleAccurateBackend::new(graph, params)),
            Err(e) => {
                log::warn!("{e}; falling back to the media element backend");
                params.backend = BackendKind::MediaElement;
                media_backend(params, platform)
            }
        },
        BackendKind::MediaElement => media_backend(params, platform),
    }
}

fn media_backend(params: &PlaybackParams, platform: &Rc<dyn Platform>) -> Box<dyn AudioBackend> {
    let platform = Rc::clone(platform);
    let factory: ElementFactory = Box::new(move || platform.create_media_element());
    Box::new(MediaElementBackend::new(factory, params))
}

/// Seek targets outside 0..=1 are clamped; anything non-finite means 0.
fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessPlatform;
    use std::cell::RefCell;

    fn tone(seconds: f64) -> DecodedAudio {
        let frames = (seconds * 8_000.0) as usize;
        let samples = (0..frames).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
        DecodedAudio::new(8_000, vec![samples])
    }

    fn ready_player(seconds: f64) -> (Player, crate::backend::OfflineHandle) {
        let platform = HeadlessPlatform::new(8_000, 1);
        let clock = platform.clock();
        let mut player = Player::new(PlaybackParams::default(), Rc::new(platform)).unwrap();
        player.load_decoded(tone(seconds));
        player.tick();
        assert_eq!(player.load_state(), LoadState::Ready);
        (player, clock)
    }

    fn record(player: &mut Player, names: &[&'static str]) -> Rc<RefCell<Vec<PlayerEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        for &name in names {
            let log = log.clone();
            player.on(name, move |e| log.borrow_mut().push(e.clone()));
        }
        log
    }

    #[test]
    fn fill_parent_draws_container_width() {
        let (player, _clock) = ready_player(2.0);
        assert_eq!(player.renderer().width(), 800);
    }

    #[test]
    fn scroll_parent_draws_nominal_width() {
        let platform = HeadlessPlatform::new(8_000, 1);
        let params = PlaybackParams {
            scroll_parent: true,
            min_px_per_sec: 100.0,
            ..PlaybackParams::default()
        };
        let mut player = Player::new(params, Rc::new(platform)).unwrap();
        player.load_decoded(tone(10.0));
        player.tick();
        assert_eq!(player.renderer().width(), 1000);
    }

    #[test]
    fn commands_from_handlers_run_next_tick() {
        let (mut player, _clock) = ready_player(2.0);
        let tx = player.commands();
        player.once("seek", move |_| tx.send(Command::Play));
        let log = record(&mut player, &["play"]);

        player.seek_to(0.5);
        assert!(log.borrow().is_empty());
        player.tick();
        assert_eq!(*log.borrow(), vec![PlayerEvent::Play]);
    }

    #[test]
    fn animation_loop_stops_when_paused() {
        let (mut player, clock) = ready_player(2.0);
        player.play();
        assert!(player.is_animating());
        clock.advance(0.5);
        player.tick();
        assert!(player.renderer().viewport().last_pos > 0.0);

        player.pause();
        player.tick();
        assert!(!player.is_animating());
    }

    #[test]
    fn mute_round_trip_restores_volume() {
        let (mut player, _clock) = ready_player(1.0);
        player.set_volume(0.6);
        player.toggle_mute();
        assert!(player.is_muted());
        assert_eq!(player.backend.volume(), 0.0);
        assert!((player.volume() - 0.6).abs() < 1e-6);
        player.toggle_mute();
        assert!((player.backend.volume() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn volume_reads_back_the_level_not_the_ducked_gain() {
        let (mut player, _clock) = ready_player(1.0);
        player.apply_session(SessionConfig {
            duck_level: 0.5,
            ..SessionConfig::default()
        });
        player.set_volume(0.6);
        assert!((player.volume() - 0.6).abs() < 1e-6);
        assert!((player.backend.volume() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn non_finite_session_levels_never_reach_the_gain() {
        let (mut player, _clock) = ready_player(1.0);
        player.apply_session(SessionConfig {
            volume: 0.8,
            duck_level: f32::NAN,
            ..SessionConfig::default()
        });
        assert!((player.backend.volume() - 0.8).abs() < 1e-6);
        assert_eq!(player.session().duck_level, 1.0);

        player.set_volume(f32::NAN);
        assert_eq!(player.volume(), 0.0);
        assert_eq!(player.backend.volume(), 0.0);
    }

    #[test]
    fn export_uses_defaults() {
        let (player, _clock) = ready_player(1.0);
        let json = player.export_peaks(None, None);
        let values: Vec<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(values.len(), 1024);
        assert!(values
            .iter()
            .all(|v| ((v * 10_000.0).round() - v * 10_000.0).abs() < 1e-6));
    }

    #[test]
    fn destroy_is_idempotent_and_inert() {
        let (mut player, clock) = ready_player(1.0);
        let log = record(&mut player, &["destroy"]);
        player.destroy();
        player.destroy();
        assert!(clock.is_closed());
        assert_eq!(log.borrow().len(), 1);

        player.play();
        player.seek_to(0.5);
        player.load("missing.wav");
        player.tick();
        assert!(!player.is_playing());
    }

    #[test]
    fn autoplay_and_repeat_follow_session() {
        let platform = HeadlessPlatform::new(8_000, 1);
        let clock = platform.clock();
        let mut player = Player::new(PlaybackParams::default(), Rc::new(platform)).unwrap();
        player.apply_session(SessionConfig {
            autoplay: true,
            repeat: true,
            ..SessionConfig::default()
        });
        player.load_decoded(tone(0.5));
        player.tick();
        assert!(player.is_playing());

        clock.advance(0.6);
        player.tick();
        assert!(player.is_playing());
        assert!(player.current_time() < 0.1);
    }
}
