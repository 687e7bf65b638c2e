// src/board.rs

use std::cell::RefCell;
use std::fmt::Write as FmtWrite;
use std::io::{stdout, Write};
use std::path::PathBuf;
use std::rc::Rc;

use crossterm::event::KeyCode;
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate},
};

use crate::backend::Platform;
use crate::controller::{LoadState, Player};
use crate::events::PlayerEvent;
use crate::params::{PlaybackParams, RendererKind};
use crate::render::Frame;
use crate::session::{Catalog, SessionConfig, SoundRecord};

/// Rows of the terminal waveform.
pub const WAVE_ROWS: u32 = 16;
const VOLUME_STEP: f32 = 0.1;

/// Terminal front end: a catalog of sounds, a category filter and one
/// player drawing into the terminal.
pub struct Soundboard {
    player: Player,
    catalog: Catalog,
    /// `"*"` first, then every playable category.
    filters: Vec<String>,
    filter_index: usize,
    /// Index into the filtered list.
    current: Option<usize>,
    status: Rc<RefCell<String>>,

    // Redraw only when something visible changed.
    cached_secs: u64,
    cached_pos: f64,
    cached_state: LoadState,
    cached_loading: Option<u8>,
    force_redraw: bool,

    // Reusable buffer for terminal output.
    draw_buffer: String,
}

impl Soundboard {
    pub fn new(
        catalog: Catalog,
        base_dir: PathBuf,
        params: PlaybackParams,
        session: SessionConfig,
        platform: Rc<dyn Platform>,
        columns: u16,
    ) -> Result<Self, anyhow::Error> {
        let mut params = params;
        params.renderer = RendererKind::Terminal;
        params.pixel_ratio = 1.0;
        params.height = WAVE_ROWS;
        let mut container = params.container.unwrap_or_default();
        container.width = u32::from(columns.max(1));
        container.height = WAVE_ROWS;
        params.container = Some(container);

        let mut player = Player::new(params, platform)?;
        player.set_base_dir(base_dir);
        player.apply_session(session);

        let status = Rc::new(RefCell::new(String::new()));
        for name in ["ready", "error", "finish"] {
            let status = status.clone();
            player.on(name, move |e| {
                let text = match e {
                    PlayerEvent::Ready => "✅ Ready".to_string(),
                    PlayerEvent::Finish => "🎵 Finished".to_string(),
                    PlayerEvent::Error(msg) => format!("❌ {msg}"),
                    _ => return,
                };
                *status.borrow_mut() = text;
            });
        }

        let mut filters = vec!["*".to_string()];
        filters.extend(catalog.categories());

        let mut board = Self {
            player,
            catalog,
            filters,
            filter_index: 0,
            current: None,
            status,
            cached_secs: u64::MAX,
            cached_pos: -1.0,
            cached_state: LoadState::Empty,
            cached_loading: None,
            force_redraw: true,
            draw_buffer: String::new(),
        };
        board.select(0);
        Ok(board)
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn session(&self) -> SessionConfig {
        self.player.session()
    }

    fn filtered(&self) -> Vec<&SoundRecord> {
        let filter = self.filters.get(self.filter_index).map(String::as_str).unwrap_or("*");
        self.catalog.filter(filter).collect()
    }

    fn select(&mut self, index: usize) {
        let path = self.filtered().get(index).map(|s| s.path.clone());
        let path = match path {
            Some(path) => path,
            None => {
                self.current = None;
                *self.status.borrow_mut() = "No playable sounds".to_string();
                return;
            }
        };
        self.current = Some(index);
        *self.status.borrow_mut() = "⏳ Loading".to_string();
        self.player.load(&path);
        self.force_redraw = true;
    }

    fn step(&mut self, delta: isize) {
        let len = self.filtered().len();
        if len == 0 {
            return;
        }
        let cur = self.current.unwrap_or(0) as isize;
        let next = (cur + delta).rem_euclid(len as isize) as usize;
        self.select(next);
    }

    fn cycle_filter(&mut self) {
        self.filter_index = (self.filter_index + 1) % self.filters.len().max(1);
        self.select(0);
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char(' ') => self.player.play_pause(),
            KeyCode::Left => self.player.skip_backward(None),
            KeyCode::Right => self.player.skip_forward(None),
            KeyCode::Char(c @ '0'..='9') => {
                let tenth = c.to_digit(10).unwrap_or(0) as f64 / 10.0;
                self.player.seek_to(tenth);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let v = self.player.session().volume;
                self.player.set_volume(v + VOLUME_STEP);
            }
            KeyCode::Char('-') => {
                let v = self.player.session().volume;
                self.player.set_volume(v - VOLUME_STEP);
            }
            KeyCode::Char('m') | KeyCode::Char('M') => self.player.toggle_mute(),
            KeyCode::Char('n') | KeyCode::Char('N') => self.step(1),
            KeyCode::Char('p') | KeyCode::Char('P') => self.step(-1),
            KeyCode::Char('f') | KeyCode::Char('F') => self.cycle_filter(),
            KeyCode::Char('s') | KeyCode::Char('S') => self.player.toggle_scroll(),
            _ => return,
        }
        self.force_redraw = true;
    }

    pub fn should_quit(&self, key: KeyCode) -> bool {
        matches!(key, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc)
    }

    pub fn run_tick(&mut self) -> Result<(), anyhow::Error> {
        // 1. Logic tick
        self.player.tick();

        // 2. Dirty check
        let secs = self.player.current_time().max(0.0) as u64;
        let pos = self.player.renderer().viewport().last_pos;
        let state = self.player.load_state();
        let loading = self.player.loading_progress();
        if !self.force_redraw
            && secs == self.cached_secs
            && pos == self.cached_pos
            && state == self.cached_state
            && loading == self.cached_loading
        {
            return Ok(());
        }
        self.cached_secs = secs;
        self.cached_pos = pos;
        self.cached_state = state;
        self.cached_loading = loading;
        self.force_redraw = false;

        // 3. Build output buffer
        self.draw_buffer.clear();
        let _ = write!(self.draw_buffer, "{}", MoveTo(0, 0));

        if let Frame::Text(lines) = self.player.renderer().frame() {
            for line in lines {
                let _ = write!(self.draw_buffer, "{line}\x1b[K\r\n");
            }
            for _ in lines.len()..WAVE_ROWS as usize {
                let _ = write!(self.draw_buffer, "\x1b[K\r\n");
            }
        }

        let _ = write!(self.draw_buffer, "{}", Clear(ClearType::UntilNewLine));
        let name = self
            .current
            .and_then(|i| self.filtered().get(i).map(|s| s.name.clone()))
            .unwrap_or_default();
        let total = self.player.duration();
        let total = if total.is_finite() { total.max(0.0) as u64 } else { 0 };
        let _ = write!(
            self.draw_buffer,
            "🎵 {name} | Time: {:02}:{:02} / {:02}:{:02}",
            secs / 60,
            secs % 60,
            total / 60,
            total % 60
        );
        if self.player.is_muted() {
            let _ = write!(self.draw_buffer, " | 🔇");
        } else {
            let _ = write!(self.draw_buffer, " | Vol: {:.0}%", self.player.volume() * 100.0);
        }
        if let Some(p) = loading {
            let _ = write!(self.draw_buffer, " | ⏳ {p}%");
        }
        let filter = self.filters.get(self.filter_index).map(String::as_str).unwrap_or("*");
        let _ = write!(
            self.draw_buffer,
            " | Filter: {filter} | {}\x1b[K\r\n",
            self.status.borrow()
        );

        // 4. Flush to terminal
        let mut stdout = stdout();
        execute!(stdout, BeginSynchronizedUpdate)?;
        stdout.write_all(self.draw_buffer.as_bytes())?;
        execute!(stdout, EndSynchronizedUpdate)?;
        stdout.flush()?;

        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.player.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessPlatform;

    const DATA: &str = r#"[
        { "name": "A", "path": "a.wav", "type": "wav", "category": "x" },
        { "name": "Bad", "path": "b.xyz", "type": "bad", "category": "y" },
        { "name": "C", "path": "c.mp3", "type": "mp3", "category": "z" }
    ]"#;

    fn board() -> Soundboard {
        let catalog = Catalog::from_json_str(DATA).unwrap();
        Soundboard::new(
            catalog,
            std::env::temp_dir(),
            PlaybackParams::default(),
            SessionConfig::default(),
            Rc::new(HeadlessPlatform::default()),
            80,
        )
        .unwrap()
    }

    #[test]
    fn filters_skip_bad_categories() {
        let b = board();
        assert_eq!(b.filters, vec!["*", "x", "z"]);
        assert_eq!(b.current, Some(0));
    }

    #[test]
    fn navigation_wraps_within_filter() {
        let mut b = board();
        b.handle_key(KeyCode::Char('p'));
        assert_eq!(b.current, Some(1));
        b.handle_key(KeyCode::Char('n'));
        assert_eq!(b.current, Some(0));

        b.handle_key(KeyCode::Char('f'));
        assert_eq!(b.filtered().len(), 1);
        assert_eq!(b.filtered()[0].name, "A");
    }

    #[test]
    fn volume_keys_step_the_session() {
        let mut b = board();
        b.handle_key(KeyCode::Char('-'));
        assert!((b.session().volume - 0.9).abs() < 1e-6);
        b.handle_key(KeyCode::Char('m'));
        assert!(b.session().muted);
        assert!(b.should_quit(KeyCode::Char('q')));
    }
}
