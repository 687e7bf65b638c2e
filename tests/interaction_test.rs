//! Pointer input, scrolling and superseded loads.

mod common;

use common::*;
use std::fs;
use waveboard::params::Container;
use waveboard::{LoadState, PlaybackParams, PlayerEvent};

fn params(width: u32) -> PlaybackParams {
    PlaybackParams {
        container: Some(Container::with_width(width)),
        ..PlaybackParams::default()
    }
}

#[test]
fn click_at_forty_percent_seeks_on_next_tick() {
    let (mut player, _clock) = headless_player(params(500));
    player.load_bytes(wav_bytes(10.0, 1), Some("wav"));
    assert_eq!(settle(&mut player), LoadState::Ready);
    assert_eq!(player.renderer().width(), 500);
    let log = record(&mut player, &["seek"]);

    assert_eq!(player.click(200.0, 10.0), Some(0.4));
    assert!(log.borrow().is_empty());

    player.tick();
    assert_eq!(*log.borrow(), vec![PlayerEvent::Seek(0.4)]);
    assert!((player.played_fraction() - 0.4).abs() <= 1.0 / 500.0);
}

#[test]
fn clicks_ignored_on_scrollbar_and_without_interaction() {
    let (mut player, _clock) = headless_player(PlaybackParams {
        scroll_parent: true,
        min_px_per_sec: 100.0,
        ..params(500)
    });
    player.load_bytes(wav_bytes(10.0, 1), Some("wav"));
    assert_eq!(settle(&mut player), LoadState::Ready);
    assert_eq!(player.renderer().width(), 1000);

    assert_eq!(player.click(100.0, 120.0), None);
    assert!(player.click(100.0, 50.0).is_some());

    player.toggle_interaction();
    assert_eq!(player.click(100.0, 50.0), None);
}

#[test]
fn playback_scrolls_a_wide_waveform() {
    let (mut player, clock) = headless_player(PlaybackParams {
        scroll_parent: true,
        min_px_per_sec: 100.0,
        ..params(500)
    });
    player.load_bytes(wav_bytes(10.0, 1), Some("wav"));
    assert_eq!(settle(&mut player), LoadState::Ready);
    let log = record(&mut player, &["scroll"]);

    player.play();
    clock.advance(6.0);
    player.tick();
    assert_eq!(player.renderer().viewport().scroll_left, 350.0);

    player.tick();
    assert_eq!(*log.borrow(), vec![PlayerEvent::Scroll(350.0)]);
}

#[test]
fn non_finite_skip_uses_skip_length_and_keeps_clicks_working() {
    let (mut player, _clock) = headless_player(PlaybackParams {
        scroll_parent: true,
        min_px_per_sec: 100.0,
        ..params(500)
    });
    player.load_bytes(wav_bytes(10.0, 1), Some("wav"));
    assert_eq!(settle(&mut player), LoadState::Ready);

    player.skip_forward(Some(6.0));
    assert_eq!(player.renderer().viewport().scroll_left, 350.0);

    player.skip_forward(Some(f64::NAN));
    assert!((player.current_time() - 8.0).abs() < 1e-6);
    assert_eq!(player.renderer().viewport().scroll_left, 500.0);

    player.skip_backward(Some(f64::INFINITY));
    assert!((player.current_time() - 6.0).abs() < 1e-6);

    player.seek_and_center(f64::NAN);
    assert_eq!(player.current_time(), 0.0);
    assert_eq!(player.renderer().viewport().scroll_left, 0.0);
    assert_eq!(player.click(200.0, 50.0), Some(0.2));
}

#[test]
fn second_load_supersedes_first_fetch() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.wav"), wav_bytes(1.0, 1)).unwrap();
    fs::write(dir.path().join("b.wav"), wav_bytes(3.0, 1)).unwrap();

    let (mut player, _clock) = headless_player(PlaybackParams::default());
    player.set_base_dir(dir.path());
    let log = record(&mut player, &["ready", "error"]);

    player.load("a.wav");
    player.load("b.wav");
    assert_eq!(settle(&mut player), LoadState::Ready);
    for _ in 0..20 {
        player.tick();
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    assert!((player.duration() - 3.0).abs() < 1e-3);
    assert_eq!(*log.borrow(), vec![PlayerEvent::Ready]);
}

#[test]
fn second_load_supersedes_first_decode() {
    let (mut player, _clock) = headless_player(PlaybackParams::default());
    let log = record(&mut player, &["ready"]);

    player.load_bytes(wav_bytes(2.0, 1), Some("wav"));
    player.load_bytes(wav_bytes(0.5, 1), Some("wav"));
    assert_eq!(settle(&mut player), LoadState::Ready);
    for _ in 0..20 {
        player.tick();
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    assert!((player.duration() - 0.5).abs() < 1e-3);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn resize_redraws_at_new_width() {
    let (mut player, _clock) = loaded_player(2.0);
    let log = record(&mut player, &["redraw"]);
    player.resize(300);
    assert_eq!(*log.borrow(), vec![PlayerEvent::Redraw { width: 300 }]);
    assert_eq!(player.renderer().width(), 300);
}

#[test]
fn destroy_then_everything_is_inert() {
    let (mut player, clock) = loaded_player(2.0);
    let log = record(&mut player, &["destroy", "play"]);
    player.destroy();
    player.destroy();
    player.play();
    player.tick();

    assert!(clock.is_closed());
    assert!(player.is_destroyed());
    assert_eq!(*log.borrow(), vec![PlayerEvent::Destroy]);
}
