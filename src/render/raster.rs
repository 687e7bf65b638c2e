// src/render/raster.rs

use super::{Frame, WaveCanvas, WaveStyle};

/// RGBA pixels. The wave and progress layers are drawn once per waveform;
/// moving the progress only re-composites.
pub struct RasterCanvas {
    style: WaveStyle,
    width: u32,
    height: u32,
    wave: Vec<u8>,
    progress_layer: Vec<u8>,
    progress: u32,
    image: Vec<u8>,
}

impl RasterCanvas {
    pub fn new(style: WaveStyle) -> Self {
        Self {
            style,
            width: 0,
            height: 0,
            wave: Vec::new(),
            progress_layer: Vec::new(),
            progress: 0,
            image: Vec::new(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let px = self.image.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    fn len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    fn fill_column(layer: &mut [u8], width: u32, x: u32, y0: u32, y1: u32, rgba: [u8; 4]) {
        for y in y0..=y1 {
            let i = ((y * width + x) * 4) as usize;
            if let Some(px) = layer.get_mut(i..i + 4) {
                px.copy_from_slice(&rgba);
            }
        }
    }

    fn composite(&mut self) {
        self.image.clear();
        self.image.extend_from_slice(&self.wave);
        let split = self.progress.min(self.width);
        let row_bytes = self.width as usize * 4;
        for y in 0..self.height as usize {
            let start = y * row_bytes;
            let end = start + split as usize * 4;
            self.image[start..end].copy_from_slice(&self.progress_layer[start..end]);
        }
        let cursor = self.style.cursor_color.to_rgba();
        let cursor_end = (split + self.style.cursor_width).min(self.width);
        if self.height > 0 {
            for x in split..cursor_end {
                Self::fill_column(&mut self.image, self.width, x, 0, self.height - 1, cursor);
            }
        }
    }
}

impl WaveCanvas for RasterCanvas {
    fn update_width(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.clear_wave();
    }

    fn clear_wave(&mut self) {
        let len = self.len();
        self.wave = vec![0; len];
        self.progress_layer = vec![0; len];
        self.composite();
    }

    fn draw_wave(&mut self, peaks: &[f32], max: f32) {
        self.clear_wave();
        if self.height == 0 {
            return;
        }
        let half = self.height / 2;
        let coef = half as f32 / if max > 0.0 { max } else { 1.0 };
        let wave = self.style.wave_color.to_rgba();
        let played = self.style.progress_color.to_rgba();

        for (x, &peak) in peaks.iter().take(self.width as usize).enumerate() {
            let h = (peak.abs() * coef).round().min(half as f32) as u32;
            let y0 = half - h;
            let y1 = (half + h).min(self.height - 1);
            Self::fill_column(&mut self.wave, self.width, x as u32, y0, y1, wave);
            Self::fill_column(&mut self.progress_layer, self.width, x as u32, y0, y1, played);
        }
        // Median line so silence is still visible.
        for x in 0..self.width {
            Self::fill_column(&mut self.wave, self.width, x, half, half, wave);
            Self::fill_column(&mut self.progress_layer, self.width, x, half, half, played);
        }
        self.composite();
    }

    fn update_progress(&mut self, position: u32) {
        if position == self.progress {
            return;
        }
        self.progress = position;
        self.composite();
    }

    fn frame(&self) -> Frame<'_> {
        Frame::Rgba {
            width: self.width,
            height: self.height,
            pixels: &self.image,
        }
    }
}
