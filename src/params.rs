// src/params.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use crate::error::{PlayerError, Result};

/// Which transport engine to try first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Decode everything up front, play through the audio graph.
    SampleAccurate,
    /// Hand the URL to a native streaming element.
    MediaElement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RendererKind {
    Raster,
    Terminal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl FromStr for Color {
    type Err = PlayerError;

    /// Accepts `#rgb` and `#rrggbb`.
    fn from_str(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| PlayerError::Config(format!("color must start with '#': {s}")))?;
        let bad = || PlayerError::Config(format!("bad color: {s}"));
        if !hex.is_ascii() {
            return Err(bad());
        }
        let nibble = |c: char| c.to_digit(16).map(|d| d as u8).ok_or_else(bad);

        match hex.len() {
            3 => {
                let mut it = hex.chars();
                let mut next = || nibble(it.next().unwrap_or('x')).map(|d| d * 17);
                Ok(Self::rgb(next()?, next()?, next()?))
            }
            6 => {
                let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
                Ok(Self::rgb(byte(0)?, byte(2)?, byte(4)?))
            }
            _ => Err(bad()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = PlayerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// The box the waveform is drawn into, in css pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    pub width: u32,
    pub height: u32,
    /// Page offset of the left edge, subtracted from pointer x.
    pub left: f64,
    pub top: f64,
    /// Height of the horizontal scrollbar when one is shown.
    pub scrollbar_height: u32,
}

impl Default for Container {
    fn default() -> Self {
        Self {
            width: 800,
            height: 128,
            left: 0.0,
            top: 0.0,
            scrollbar_height: 16,
        }
    }
}

impl Container {
    pub fn with_width(width: u32) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }
}

/// Resolved once when the player is built. After that only the player's
/// setters change it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackParams {
    pub height: u32,
    pub wave_color: Color,
    pub progress_color: Color,
    pub cursor_color: Color,
    pub cursor_width: u32,
    /// Seconds moved by skip_forward/skip_backward without an argument.
    pub skip_length: f64,
    pub min_px_per_sec: f64,
    pub pixel_ratio: f64,
    pub fill_parent: bool,
    pub scroll_parent: bool,
    pub hide_scrollbar: bool,
    pub normalize: bool,
    pub audio_rate: f64,
    pub interact: bool,
    pub renderer: RendererKind,
    pub backend: BackendKind,
    /// Max px moved per recenter step while the cursor is on screen.
    pub recenter_rate_px: f64,
    /// Peak windows are sampled every `window / divisor` values.
    pub peak_step_divisor: usize,
    pub container: Option<Container>,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            height: 128,
            wave_color: Color::rgb(0x99, 0x99, 0x99),
            progress_color: Color::rgb(0x55, 0x55, 0x55),
            cursor_color: Color::rgb(0x33, 0x33, 0x33),
            cursor_width: 1,
            skip_length: 2.0,
            min_px_per_sec: 20.0,
            pixel_ratio: 1.0,
            fill_parent: true,
            scroll_parent: false,
            hide_scrollbar: false,
            normalize: false,
            audio_rate: 1.0,
            interact: true,
            renderer: RendererKind::Raster,
            backend: BackendKind::SampleAccurate,
            recenter_rate_px: 5.0,
            peak_step_divisor: 10,
            container: Some(Container::default()),
        }
    }
}

impl PlaybackParams {
    pub fn load_from_disk(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let params: Self =
            serde_json::from_reader(reader).map_err(|e| PlayerError::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.pixel_ratio > 0.0) {
            return Err(PlayerError::Config("pixel_ratio must be positive".into()));
        }
        if !(self.audio_rate > 0.0) {
            return Err(PlayerError::Config("audio_rate must be positive".into()));
        }
        if self.peak_step_divisor == 0 {
            return Err(PlayerError::Config("peak_step_divisor must be at least 1".into()));
        }
        Ok(())
    }
}
