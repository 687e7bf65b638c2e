//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Cursor;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use waveboard::backend::{AudioGraph, MediaElement, MediaEvent, OfflineHandle};
use waveboard::{
    HeadlessPlatform, LoadState, PlaybackParams, Platform, Player, PlayerError, PlayerEvent,
};

pub const RATE: u32 = 8_000;

/// 16-bit PCM WAV with a quiet sine, built in memory with hound.
pub fn wav_bytes(seconds: f64, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (seconds * RATE as f64) as usize;
        for i in 0..frames {
            let v = ((i as f32 * 0.03).sin() * 0.4 * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn headless_player(params: PlaybackParams) -> (Player, OfflineHandle) {
    let platform = HeadlessPlatform::new(RATE, 1);
    let clock = platform.clock();
    let player = Player::new(params, Rc::new(platform)).unwrap();
    (player, clock)
}

/// Ticks until the current load settles, like a UI frame loop would.
pub fn settle(player: &mut Player) -> LoadState {
    let deadline = Instant::now() + Duration::from_secs(10);
    player.tick();
    while player.load_state() == LoadState::Loading && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
        player.tick();
    }
    player.load_state()
}

pub fn loaded_player(seconds: f64) -> (Player, OfflineHandle) {
    let (mut player, clock) = headless_player(PlaybackParams::default());
    player.load_bytes(wav_bytes(seconds, 1), Some("wav"));
    assert_eq!(settle(&mut player), LoadState::Ready);
    (player, clock)
}

pub type EventLog = Rc<RefCell<Vec<PlayerEvent>>>;

pub fn record(player: &mut Player, names: &[&'static str]) -> EventLog {
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    for &name in names {
        let log = log.clone();
        player.on(name, move |e| log.borrow_mut().push(e.clone()));
    }
    log
}

pub fn count(log: &EventLog, wanted: &PlayerEvent) -> usize {
    log.borrow().iter().filter(|e| *e == wanted).count()
}

// ===== scripted media element =====

#[derive(Default)]
pub struct Script {
    pub opened: Vec<String>,
    pub time: f64,
    pub duration: f64,
    pub paused: bool,
    pub volume: f32,
    pub events: VecDeque<MediaEvent>,
}

pub struct ScriptedElement(pub Rc<RefCell<Script>>);

impl MediaElement for ScriptedElement {
    fn open(&mut self, url: &str) {
        let mut s = self.0.borrow_mut();
        s.opened.push(url.to_string());
        s.paused = true;
        s.events.push_back(MediaEvent::CanPlay);
    }
    fn play(&mut self) {
        self.0.borrow_mut().paused = false;
    }
    fn pause(&mut self) {
        self.0.borrow_mut().paused = true;
    }
    fn paused(&self) -> bool {
        self.0.borrow().paused
    }
    fn current_time(&self) -> f64 {
        self.0.borrow().time
    }
    fn set_current_time(&mut self, seconds: f64) {
        self.0.borrow_mut().time = seconds;
    }
    fn duration(&self) -> f64 {
        self.0.borrow().duration
    }
    fn seekable_end(&self) -> f64 {
        self.0.borrow().duration
    }
    fn set_volume(&mut self, level: f32) {
        self.0.borrow_mut().volume = level;
    }
    fn volume(&self) -> f32 {
        self.0.borrow().volume
    }
    fn set_playback_rate(&mut self, _rate: f64) {}
    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.0.borrow_mut().events.pop_front()
    }
    fn release(&mut self) {}
}

/// A host with no sample-accurate graph at all.
pub struct NoGraphPlatform {
    pub script: Rc<RefCell<Script>>,
}

impl Platform for NoGraphPlatform {
    fn create_graph(&self) -> waveboard::Result<Box<dyn AudioGraph>> {
        Err(PlayerError::Capability("no audio graph in this host".into()))
    }

    fn create_media_element(&self) -> Box<dyn MediaElement> {
        Box::new(ScriptedElement(self.script.clone()))
    }
}

/// Answers the first request on a loopback port with `response` and closes
/// the connection. Returns the base `http://` URL.
pub fn serve_once(response: Vec<u8>) -> String {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let _ = stream.write_all(&response);
        let _ = stream.flush();
    });
    format!("http://{addr}")
}
