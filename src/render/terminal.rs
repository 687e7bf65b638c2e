// src/render/terminal.rs

use super::{Frame, WaveCanvas};

const PLAYED: char = '█';
const UNPLAYED: char = '▒';
const CURSOR: char = '│';

/// One character cell per column, `height` rows. The played part is solid,
/// the rest shaded.
#[derive(Debug, Default)]
pub struct TerminalCanvas {
    width: usize,
    height: usize,
    /// Normalized to 0..=1.
    columns: Vec<f32>,
    progress: usize,
    lines: Vec<String>,
}

impl TerminalCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn rebuild(&mut self) {
        if self.width == 0 || self.height == 0 {
            self.lines.clear();
            return;
        }
        let mut maxs = vec![0.0f32; self.width];
        for (slot, &v) in maxs.iter_mut().zip(&self.columns) {
            *slot = v;
        }
        let mins: Vec<f32> = maxs.iter().map(|v| -v).collect();
        self.lines = render_ascii(&mins, &maxs, self.height, self.progress);
    }
}

impl WaveCanvas for TerminalCanvas {
    fn update_width(&mut self, width: u32, height: u32) {
        self.width = width as usize;
        self.height = height as usize;
        self.columns.clear();
        self.rebuild();
    }

    fn clear_wave(&mut self) {
        self.columns.clear();
        self.rebuild();
    }

    fn draw_wave(&mut self, peaks: &[f32], max: f32) {
        let max = if max > 0.0 { max } else { 1.0 };
        self.columns = peaks.iter().map(|p| (p / max).clamp(0.0, 1.0)).collect();
        self.rebuild();
    }

    fn update_progress(&mut self, position: u32) {
        let position = position as usize;
        if position == self.progress {
            return;
        }
        self.progress = position;
        self.rebuild();
    }

    fn frame(&self) -> Frame<'_> {
        Frame::Text(&self.lines)
    }
}

/// Mirrored bars between `mins` and `maxs` (both in -1..=1). Columns left of
/// `progress` are drawn as played; the cursor sits on the empty cells of
/// column `progress`.
pub fn render_ascii(mins: &[f32], maxs: &[f32], height: usize, progress: usize) -> Vec<String> {
    let h = height.max(1);
    let w = mins.len().min(maxs.len());
    let mut lines = vec![vec![' '; w]; h];
    let to_row = |v: f32| -> usize {
        let clamped = v.clamp(-1.0, 1.0);
        let y = (0.5 - 0.5 * clamped) * (h as f32 - 1.0);
        y.round() as usize
    };
    for x in 0..w {
        let y1 = to_row(maxs[x]);
        let y0 = to_row(mins[x]);
        let (a, b) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        let fill = if x < progress { PLAYED } else { UNPLAYED };
        for row in lines.iter_mut().take(b + 1).skip(a) {
            row[x] = fill;
        }
        if x == progress {
            for row in lines.iter_mut() {
                if row[x] == ' ' {
                    row[x] = CURSOR;
                }
            }
        }
    }
    lines.into_iter().map(|row| row.into_iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn played_columns_are_solid() {
        let mut canvas = TerminalCanvas::new();
        canvas.update_width(4, 5);
        canvas.draw_wave(&[1.0, 1.0, 0.0, 1.0], 1.0);
        canvas.update_progress(2);

        let lines = canvas.lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "██│▒");
        assert_eq!(lines[2], "██▒▒");
    }

    #[test]
    fn silence_draws_median_only() {
        let rows = render_ascii(&[0.0; 3], &[0.0; 3], 3, 3);
        assert_eq!(rows, vec!["   ", "███", "   "]);
    }

    #[test]
    fn quiet_peaks_scale_to_max() {
        let mut canvas = TerminalCanvas::new();
        canvas.update_width(2, 3);
        canvas.draw_wave(&[0.25, 0.5], 0.5);
        canvas.update_progress(0);
        // The louder column reaches the top row, the other one does not.
        assert_eq!(canvas.lines()[1], "▒▒");
        assert_eq!(canvas.lines()[0], "│▒");
    }
}
