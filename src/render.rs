use crate::field::FlowLine;
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

// Cell geometry. One glyph box stands in for 8x16 logical px, so one
// braille dot covers 4x4 px on both axes. The engine works in logical px
// throughout; only this module converts to dots.
pub(crate) const CELL_PX_W: f32 = 8.0;
pub(crate) const CELL_PX_H: f32 = 16.0;
pub(crate) const PX_TO_DOTS: f32 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Color::Rgb {
            r: c.r,
            g: c.g,
            b: c.b,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            c.ch = ' ';
            c.fg = Color::White;
            c.bg = bg;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Pixel>,
    // multiplies the alpha of everything stamped, like a drawing context's
    // global opacity
    global_alpha: f32,
    // per-dot stroke generation: one stroke covers a dot once, however
    // many stamps land on it
    stroke_mark: Vec<u32>,
    stroke_id: u32,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        let n = (w as usize) * (h as usize);
        Self {
            w,
            h,
            px: vec![Pixel::default(); n],
            global_alpha: 1.0,
            stroke_mark: vec![u32::MAX; n],
            stroke_id: 0,
        }
    }
    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn clear(&mut self, p: Pixel) {
        self.px.fill(p);
    }
    pub(crate) fn set_global_alpha(&mut self, a: f32) {
        self.global_alpha = a.clamp(0.0, 1.0);
    }

    fn begin_stroke(&mut self) {
        self.stroke_id = self.stroke_id.wrapping_add(1);
        if self.stroke_id == 0 {
            self.stroke_mark.fill(u32::MAX);
            self.stroke_id = 1;
        }
    }

    // Coverage-gated stamp: the first hit of the current stroke blends,
    // repeats are ignored.
    fn stamp(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (xu, yu) = (x as u32, y as u32);
        if xu >= self.w || yu >= self.h {
            return;
        }
        let i = self.idx(xu, yu);
        if self.stroke_mark[i] == self.stroke_id {
            return;
        }
        self.stroke_mark[i] = self.stroke_id;
        let a = (src.a as f32 * self.global_alpha + 0.5) as u8;
        self.blend_over(x, y, Pixel { a, ..src });
    }

    fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }
}

/* -----------------------------
   Path stroking
------------------------------ */

/// Wipes the canvas and strokes every line in order. Later lines
/// composite over earlier ones.
pub(crate) fn stroke_lines(canvas: &mut PixelCanvas, lines: &[FlowLine]) {
    canvas.clear(Pixel::default());
    for line in lines {
        stroke_line(canvas, line);
    }
}

fn px_to_dots(p: (f32, f32)) -> (f32, f32) {
    (p.0 * PX_TO_DOTS, p.1 * PX_TO_DOTS)
}

// Smoothed polyline: each interior point is the control of a quadratic
// segment that ends at the midpoint to the following point. The stroke
// runs at the line's own opacity, and the canvas alpha is put back
// afterwards so one line's styling never bleeds into the next.
fn stroke_line(canvas: &mut PixelCanvas, line: &FlowLine) {
    if line.points.len() < 3 {
        return;
    }
    canvas.set_global_alpha(line.opacity);
    canvas.begin_stroke();

    let ink = Pixel {
        r: line.color.r,
        g: line.color.g,
        b: line.color.b,
        a: 255,
    };
    // A dot spans 4 px, so a faithful px radius would stay under half a
    // dot for every width in range and all lines would come out as
    // hairlines. Widths map one px to one dot instead.
    let radius = line.width * 0.5;

    let mut cur = px_to_dots(line.points[0]);
    for i in 1..line.points.len() - 1 {
        let ctrl = px_to_dots(line.points[i]);
        let next = px_to_dots(line.points[i + 1]);
        let end = ((ctrl.0 + next.0) * 0.5, (ctrl.1 + next.1) * 0.5);
        stroke_quad(canvas, cur, ctrl, end, radius, ink);
        cur = end;
    }

    canvas.set_global_alpha(1.0);
}

fn stroke_quad(
    canvas: &mut PixelCanvas,
    p0: (f32, f32),
    c: (f32, f32),
    p1: (f32, f32),
    radius: f32,
    ink: Pixel,
) {
    // sample every half dot so consecutive stamps stay connected
    let approx_len = dist(p0, c) + dist(c, p1);
    let steps = ((approx_len * 2.0).ceil() as usize).max(1);
    for s in 0..=steps {
        let t = s as f32 / steps as f32;
        let mt = 1.0 - t;
        let x = mt * mt * p0.0 + 2.0 * mt * t * c.0 + t * t * p1.0;
        let y = mt * mt * p0.1 + 2.0 * mt * t * c.1 + t * t * p1.1;
        stamp_disc(canvas, x, y, radius, ink);
    }
}

fn stamp_disc(canvas: &mut PixelCanvas, x: f32, y: f32, radius: f32, ink: Pixel) {
    // the dot under the point always inks, so hairlines stay connected
    canvas.stamp(x.floor() as i32, y.floor() as i32, ink);
    if radius <= 0.5 {
        return;
    }
    let x0 = (x - radius).floor() as i32;
    let x1 = (x + radius).floor() as i32;
    let y0 = (y - radius).floor() as i32;
    let y1 = (y + radius).floor() as i32;
    for iy in y0..=y1 {
        for ix in x0..=x1 {
            let dx = ix as f32 + 0.5 - x;
            let dy = iy as f32 + 0.5 - y;
            if dx * dx + dy * dy <= radius * radius {
                canvas.stamp(ix, iy, ink);
            }
        }
    }
}

fn dist(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/* -----------------------------
   Terminal (alt screen + diff presentation)
------------------------------ */

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    pub(crate) canvas: PixelCanvas,
}

// The bottom row is the status line; the braille canvas gets the rest.
pub(crate) fn canvas_rows(rows: u16) -> u16 {
    rows.saturating_sub(1)
}

pub(crate) fn canvas_px(cols: u16, rows: u16) -> (f32, f32) {
    (
        cols as f32 * CELL_PX_W,
        canvas_rows(rows) as f32 * CELL_PX_H,
    )
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        let prev = CellBuffer::new(cols, rows);
        let cur = CellBuffer::new(cols, rows);
        let canvas = PixelCanvas::new(cols as u32 * 2, canvas_rows(rows) as u32 * 4);

        Ok(Self {
            out,
            cols,
            rows,
            prev,
            cur,
            canvas,
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn canvas_px(&self) -> (f32, f32) {
        canvas_px(self.cols, self.rows)
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.canvas = PixelCanvas::new(c as u32 * 2, canvas_rows(r) as u32 * 4);
        // the emulator keeps stale glyphs across a resize
        execute!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   Braille encoding: 2x4 dots -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: u32, dy: u32) -> u8 {
    // Dot mapping:
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

pub(crate) fn canvas_to_cells(
    canvas: &PixelCanvas,
    out: &mut CellBuffer,
    enable_color: bool,
    backdrop: Rgb,
) {
    let cols = (canvas.w / 2).min(out.w as u32);
    let rows = (canvas.h / 4).min(out.h as u32);
    let bg = if enable_color {
        Color::from(backdrop)
    } else {
        Color::Black
    };

    for cy in 0..rows {
        for cx in 0..cols {
            let px0 = cx * 2;
            let py0 = cy * 4;

            let mut mask: u8 = 0;
            let mut sum_r: u32 = 0;
            let mut sum_g: u32 = 0;
            let mut sum_b: u32 = 0;
            let mut ink_count: u32 = 0;

            for dy in 0..4 {
                for dx in 0..2 {
                    let p = canvas.px[canvas.idx(px0 + dx, py0 + dy)];
                    let a = p.a as u32;

                    // threshold: treat alpha as ink
                    if a >= 32 {
                        mask |= braille_bit(dx, dy);
                        // composite over the backdrop so faint lines
                        // come out dim instead of full-bright
                        sum_r += (p.r as u32 * a + backdrop.r as u32 * (255 - a)) / 255;
                        sum_g += (p.g as u32 * a + backdrop.g as u32 * (255 - a)) / 255;
                        sum_b += (p.b as u32 * a + backdrop.b as u32 * (255 - a)) / 255;
                        ink_count += 1;
                    }
                }
            }

            let ch = char::from_u32(0x2800 + (mask as u32)).unwrap_or(' ');

            let fg = if enable_color && ink_count > 0 {
                Color::Rgb {
                    r: (sum_r / ink_count) as u8,
                    g: (sum_g / ink_count) as u8,
                    b: (sum_b / ink_count) as u8,
                }
            } else {
                Color::White
            };

            out.set(cx as u16, cy as u16, Cell { ch, fg, bg });
        }
    }
}

/* -----------------------------
   Text overlay
------------------------------ */

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FlowLine;

    const PINK: Rgb = Rgb::new(0xf9, 0x26, 0x72);
    const BACKDROP: Rgb = Rgb::new(39, 40, 34);

    fn straight_line(opacity: f32) -> FlowLine {
        // dots (2,2) .. (7,2) once scaled
        FlowLine {
            points: vec![(8.0, 8.0), (16.0, 8.0), (24.0, 8.0), (32.0, 8.0)],
            color: PINK,
            opacity,
            width: 1.0,
        }
    }

    #[test]
    fn layout_boundary_falls_at_96_columns() {
        assert_eq!(canvas_px(96, 25).0, 768.0);
        assert!(canvas_px(95, 25).0 < 768.0);
        assert_eq!(canvas_px(96, 25).1, 24.0 * 16.0);
    }

    #[test]
    fn braille_dots_map_to_their_bits() {
        let mut canvas = PixelCanvas::new(2, 4);
        let ink = Pixel {
            r: 255,
            g: 255,
            b: 255,
            a: 255,
        };
        let i = canvas.idx(0, 0);
        canvas.px[i] = ink;
        let i = canvas.idx(1, 3);
        canvas.px[i] = ink;

        let mut out = CellBuffer::new(1, 1);
        canvas_to_cells(&canvas, &mut out, true, BACKDROP);
        assert_eq!(out.cells[0].ch, char::from_u32(0x2800 + 0x81).unwrap());
    }

    #[test]
    fn faint_alpha_is_not_ink() {
        let mut canvas = PixelCanvas::new(2, 4);
        let i = canvas.idx(0, 0);
        canvas.px[i] = Pixel {
            r: 255,
            g: 255,
            b: 255,
            a: 16,
        };
        let mut out = CellBuffer::new(1, 1);
        canvas_to_cells(&canvas, &mut out, true, BACKDROP);
        assert_eq!(out.cells[0].ch, '\u{2800}');
    }

    #[test]
    fn dim_ink_renders_darker_than_bright_ink() {
        let mut canvas = PixelCanvas::new(2, 4);
        let mut out = CellBuffer::new(1, 1);

        let i = canvas.idx(0, 0);
        canvas.px[i] = Pixel {
            r: PINK.r,
            g: PINK.g,
            b: PINK.b,
            a: 255,
        };
        canvas_to_cells(&canvas, &mut out, true, BACKDROP);
        let bright = match out.cells[0].fg {
            Color::Rgb { r, .. } => r,
            _ => panic!("expected rgb"),
        };

        canvas.px[i].a = 64;
        canvas_to_cells(&canvas, &mut out, true, BACKDROP);
        let dim = match out.cells[0].fg {
            Color::Rgb { r, .. } => r,
            _ => panic!("expected rgb"),
        };

        assert!(dim < bright, "dim {dim} vs bright {bright}");
    }

    #[test]
    fn mono_mode_uses_plain_white() {
        let mut canvas = PixelCanvas::new(2, 4);
        let i = canvas.idx(0, 0);
        canvas.px[i] = Pixel {
            r: PINK.r,
            g: PINK.g,
            b: PINK.b,
            a: 255,
        };
        let mut out = CellBuffer::new(1, 1);
        canvas_to_cells(&canvas, &mut out, false, BACKDROP);
        assert_eq!(out.cells[0].fg, Color::White);
        assert_eq!(out.cells[0].bg, Color::Black);
    }

    #[test]
    fn stroke_inks_the_path_and_restores_alpha() {
        let mut canvas = PixelCanvas::new(40, 40);
        stroke_lines(&mut canvas, &[straight_line(0.5)]);
        for x in 2..=7u32 {
            assert!(canvas.px[canvas.idx(x, 2)].a > 0, "gap at dot {x}");
        }
        assert_eq!(canvas.global_alpha, 1.0);
    }

    #[test]
    fn one_stroke_covers_a_dot_once() {
        let mut canvas = PixelCanvas::new(40, 40);
        stroke_lines(&mut canvas, &[straight_line(0.5)]);
        // single coverage at opacity 0.5 lands at exactly half alpha,
        // however many stamps hit the dot
        assert_eq!(canvas.px[canvas.idx(3, 2)].a, 128);
    }

    #[test]
    fn wider_lines_ink_more_dots() {
        let inked = |width: f32| {
            let mut canvas = PixelCanvas::new(40, 40);
            stroke_lines(
                &mut canvas,
                &[FlowLine {
                    width,
                    ..straight_line(1.0)
                }],
            );
            canvas.px.iter().filter(|p| p.a > 0).count()
        };
        assert!(inked(3.4) > inked(1.0), "width must widen the stroke");
    }

    #[test]
    fn later_lines_composite_over_earlier_ones() {
        let mut canvas = PixelCanvas::new(40, 40);
        stroke_lines(&mut canvas, &[straight_line(0.5), straight_line(0.5)]);
        assert!(canvas.px[canvas.idx(3, 2)].a > 128);
    }

    #[test]
    fn stroke_clears_the_previous_frame() {
        let mut canvas = PixelCanvas::new(40, 40);
        stroke_lines(&mut canvas, &[straight_line(0.5)]);
        stroke_lines(&mut canvas, &[]);
        assert!(canvas.px.iter().all(|p| p.a == 0));
    }

    #[test]
    fn draw_text_clips_at_the_edge() {
        let mut buf = CellBuffer::new(4, 1);
        draw_text(&mut buf, 2, 0, "abcdef", Color::White, Color::Black);
        assert_eq!(buf.cells[buf.idx(2, 0)].ch, 'a');
        assert_eq!(buf.cells[buf.idx(3, 0)].ch, 'b');
    }
}
