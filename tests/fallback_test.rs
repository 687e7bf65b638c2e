//! Hosts without a sample-accurate graph fall back to the media element.

mod common;

use common::*;
use std::cell::RefCell;
use std::rc::Rc;
use waveboard::{BackendKind, LoadState, PlaybackParams, Player, PlayerEvent};

fn fallback_player(duration: f64) -> (Player, Rc<RefCell<Script>>) {
    let script = Rc::new(RefCell::new(Script {
        duration,
        paused: true,
        ..Script::default()
    }));
    let platform = NoGraphPlatform {
        script: script.clone(),
    };
    let player = Player::new(PlaybackParams::default(), Rc::new(platform)).unwrap();
    (player, script)
}

#[test]
fn missing_graph_falls_back_without_error() {
    let (mut player, script) = fallback_player(30.0);
    let log = record(&mut player, &["error", "ready", "play"]);

    assert_eq!(player.backend_kind(), BackendKind::MediaElement);
    assert_eq!(player.params().backend, BackendKind::MediaElement);

    player.load("clips/song.mp3");
    player.tick();
    assert_eq!(player.load_state(), LoadState::Ready);

    player.play();
    assert!(player.is_playing());

    let opened = script.borrow().opened.clone();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].ends_with("song.mp3"));
    assert_eq!(*log.borrow(), vec![PlayerEvent::Ready, PlayerEvent::Play]);
}

#[test]
fn media_element_transport_goes_through_the_element() {
    let (mut player, script) = fallback_player(30.0);
    player.load("song.mp3");
    player.tick();
    player.play();

    script.borrow_mut().time = 12.0;
    assert!((player.played_fraction() - 0.4).abs() < 1e-9);

    player.seek_to(0.5);
    assert_eq!(script.borrow().time, 15.0);
    assert!(player.is_playing());

    player.set_volume(0.25);
    assert_eq!(script.borrow().volume, 0.25);
}

#[test]
fn supplied_peaks_are_drawn_across_the_container() {
    let (mut player, _script) = fallback_player(30.0);
    let log = record(&mut player, &["redraw"]);
    player.load_with_peaks("song.mp3", Some(vec![0.2, 0.8, 0.4, 0.1]));
    player.tick();

    assert_eq!(*log.borrow(), vec![PlayerEvent::Redraw { width: 800 }]);
    let json = player.export_peaks(None, Some(10));
    assert_eq!(json, "[0.2,0.8,0.4,0.1]");
}

#[test]
fn encoded_bytes_are_an_error_for_the_media_element() {
    let (mut player, _script) = fallback_player(30.0);
    let log = record(&mut player, &["error"]);
    player.load_bytes(wav_bytes(0.5, 1), Some("wav"));
    player.tick();

    assert_eq!(player.load_state(), LoadState::Failed);
    assert_eq!(
        *log.borrow(),
        vec![PlayerEvent::Error("Error loading media element".into())]
    );
}
