// src/render/mod.rs

pub mod raster;
pub mod terminal;

use crate::error::{PlayerError, Result};
use crate::events::{BusEvent, EventBus};
use crate::params::{Color, Container, PlaybackParams, RendererKind};
use crate::peaks::{fit_to_width, max_peak};

pub use raster::RasterCanvas;
pub use terminal::TerminalCanvas;

/// Colors and sizes a canvas needs; fixed for the renderer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveStyle {
    pub wave_color: Color,
    pub progress_color: Color,
    pub cursor_color: Color,
    pub cursor_width: u32,
}

impl WaveStyle {
    pub fn from_params(params: &PlaybackParams) -> Self {
        Self {
            wave_color: params.wave_color,
            progress_color: params.progress_color,
            cursor_color: params.cursor_color,
            cursor_width: params.cursor_width,
        }
    }
}

/// What a canvas currently shows.
pub enum Frame<'a> {
    Rgba {
        width: u32,
        height: u32,
        pixels: &'a [u8],
    },
    Text(&'a [String]),
}

/// The drawing surface behind a [`Renderer`]. Widths are device pixels.
pub trait WaveCanvas {
    /// Resizes and clears.
    fn update_width(&mut self, width: u32, height: u32);
    fn clear_wave(&mut self);
    /// Mirrored fill of one peak per column, scaled so `max` reaches the edge.
    fn draw_wave(&mut self, peaks: &[f32], max: f32);
    /// Moves the progress boundary to `position` pixels.
    fn update_progress(&mut self, position: u32);
    fn frame(&self) -> Frame<'_>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderEvent {
    /// Fraction of the waveform that was clicked.
    Click(f64),
    /// New horizontal scroll offset in css px.
    Scroll(f64),
}

impl BusEvent for RenderEvent {
    fn name(&self) -> &'static str {
        match self {
            RenderEvent::Click(_) => "click",
            RenderEvent::Scroll(_) => "scroll",
        }
    }
}

/// Only mutated by [`Renderer`] methods.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportState {
    /// Rendered width in device pixels.
    pub width: u32,
    /// css px.
    pub scroll_left: f64,
    /// Last progress position drawn, css px.
    pub last_pos: f64,
}

pub struct Renderer {
    params: PlaybackParams,
    container: Container,
    viewport: ViewportState,
    canvas: Box<dyn WaveCanvas>,
    bus: EventBus<RenderEvent>,
    destroyed: bool,
}

impl Renderer {
    /// Fails when there is no container to draw into.
    pub fn new(params: &PlaybackParams) -> Result<Self> {
        let container = params
            .container
            .ok_or_else(|| PlayerError::Container("no container given".into()))?;
        let style = WaveStyle::from_params(params);
        let canvas: Box<dyn WaveCanvas> = match params.renderer {
            RendererKind::Raster => Box::new(RasterCanvas::new(style)),
            RendererKind::Terminal => Box::new(TerminalCanvas::new()),
        };
        Ok(Self::with_canvas(params, container, canvas))
    }

    pub fn with_canvas(params: &PlaybackParams, container: Container, canvas: Box<dyn WaveCanvas>) -> Self {
        Self {
            params: params.clone(),
            container,
            viewport: ViewportState::default(),
            canvas,
            bus: EventBus::new(),
            destroyed: false,
        }
    }

    pub fn bus(&mut self) -> &mut EventBus<RenderEvent> {
        &mut self.bus
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn frame(&self) -> Frame<'_> {
        self.canvas.frame()
    }

    pub fn params(&self) -> &PlaybackParams {
        &self.params
    }

    pub(crate) fn set_scroll_parent(&mut self, on: bool) {
        self.params.scroll_parent = on;
    }

    pub(crate) fn set_interact(&mut self, on: bool) {
        self.params.interact = on;
    }

    /// Container width in device pixels.
    pub fn parent_width(&self) -> u32 {
        (self.container.width as f64 * self.params.pixel_ratio).round() as u32
    }

    pub fn width(&self) -> u32 {
        self.viewport.width
    }

    fn client_width(&self) -> f64 {
        self.container.width as f64
    }

    /// Full scrollable width in css px.
    pub fn scroll_width(&self) -> f64 {
        let drawn = self.viewport.width as f64 / self.params.pixel_ratio;
        if self.params.fill_parent || self.params.scroll_parent {
            drawn.max(self.client_width())
        } else {
            drawn
        }
    }

    fn max_scroll(&self) -> f64 {
        (self.scroll_width() - self.client_width()).max(0.0)
    }

    fn scrollbar_visible(&self) -> bool {
        (self.params.fill_parent || self.params.scroll_parent)
            && !self.params.hide_scrollbar
            && self.max_scroll() > 0.0
    }

    pub fn set_container_width(&mut self, width: u32) {
        self.container.width = width;
    }

    /// No-op when unchanged; otherwise resizes and clears the canvas.
    pub fn set_width(&mut self, width: u32) {
        if width == self.viewport.width {
            return;
        }
        self.viewport.width = width;
        let height = (self.params.height as f64 * self.params.pixel_ratio).round() as u32;
        self.canvas.update_width(width, height);
    }

    pub fn draw_peaks(&mut self, peaks: &[f32], width: u32) {
        if self.destroyed {
            return;
        }
        self.reset_scroll();
        self.set_width(width);
        let max = if self.params.normalize {
            let m = max_peak(peaks);
            if m > 0.0 { m } else { 1.0 }
        } else {
            1.0
        };
        let columns = if self.params.fill_parent && peaks.len() != width as usize {
            fit_to_width(peaks, width as usize)
        } else {
            peaks.to_vec()
        };
        self.canvas.draw_wave(&columns, max);
        let pos = (self.viewport.last_pos * self.params.pixel_ratio).round() as u32;
        self.canvas.update_progress(pos);
    }

    /// Moves the progress boundary. Redraws only when the position moved
    /// backwards or by at least one device pixel.
    pub fn progress(&mut self, fraction: f64) {
        if self.destroyed {
            return;
        }
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let min_px_delta = 1.0 / self.params.pixel_ratio;
        let pos = (fraction * self.viewport.width as f64).round() * min_px_delta;

        if pos < self.viewport.last_pos || pos - self.viewport.last_pos >= min_px_delta {
            self.viewport.last_pos = pos;
            if self.params.scroll_parent {
                let new_pos = (self.scroll_width() * fraction).floor();
                self.recenter_on_position(new_pos, false);
            }
            self.canvas
                .update_progress((self.viewport.width as f64 * fraction).round() as u32);
        }
    }

    pub fn recenter(&mut self, fraction: f64) {
        let position = self.scroll_width() * fraction;
        self.recenter_on_position(position, true);
    }

    /// Scrolls so `position` (css px) sits in the middle. While the
    /// position is already on screen and `immediate` is false, each call
    /// moves at most `recenter_rate_px`.
    pub fn recenter_on_position(&mut self, position: f64, immediate: bool) {
        if !position.is_finite() {
            return;
        }
        let scroll_left = self.viewport.scroll_left;
        let half = (self.client_width() / 2.0).floor();
        let mut target = position - half;
        let offset = target - scroll_left;
        let max_scroll = self.max_scroll();

        if max_scroll == 0.0 {
            return;
        }

        if !immediate && -half <= offset && offset < half {
            let rate = self.params.recenter_rate_px;
            target = scroll_left + offset.clamp(-rate, rate);
        }

        let target = target.clamp(0.0, max_scroll);
        if target != scroll_left {
            self.viewport.scroll_left = target;
            self.bus.emit(&RenderEvent::Scroll(target));
        }
    }

    pub fn reset_scroll(&mut self) {
        self.viewport.scroll_left = 0.0;
    }

    /// Pointer input at page coordinates. Clicks on a visible scrollbar are
    /// ignored; otherwise, with interaction on, the clicked fraction is
    /// raised as a `click` event and returned.
    pub fn click(&mut self, x: f64, y: f64) -> Option<f64> {
        if self.destroyed {
            return None;
        }
        if self.scrollbar_visible() {
            let bottom = self.container.top + self.container.height as f64;
            if y >= bottom - self.container.scrollbar_height as f64 {
                return None;
            }
        }
        if !self.params.interact {
            return None;
        }
        let fraction = (x - self.container.left + self.viewport.scroll_left) / self.scroll_width();
        let fraction = if fraction.is_finite() { fraction } else { 0.0 };
        self.bus.emit(&RenderEvent::Click(fraction));
        Some(fraction)
    }

    /// Draws an empty waveform and forgets progress.
    pub fn clear(&mut self) {
        self.viewport.last_pos = 0.0;
        self.canvas.clear_wave();
        self.canvas.update_progress(0);
    }

    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.bus.off_all();
        self.canvas.update_width(0, 0);
        self.viewport = ViewportState::default();
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
