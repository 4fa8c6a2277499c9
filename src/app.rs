use crate::config::{self, load_settings, project_paths, save_settings_atomic, Cli, Settings};
use crate::driver::{Driver, DriverState};
use crate::field::{FlowField, FlowLine};
use crate::input::{collect_input_nonblocking, map_event_to_action, Action};
use crate::render::{canvas_rows, canvas_to_cells, draw_text, stroke_lines, Cell, Rgb, Terminal};
use anyhow::Result;
use clap::Parser;
use crossterm::style::Color;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::cmp::min;
use std::time::{Duration, Instant};

// Monokai chrome
const BACKDROP: Rgb = Rgb::new(0x27, 0x28, 0x22);
const TEXT_PRIMARY: Rgb = Rgb::new(0xf8, 0xf8, 0xf2);
const TEXT_FADED: Rgb = Rgb::new(0x75, 0x71, 0x5e);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scene {
    Field,
    About,
}

pub(crate) struct App {
    settings: Settings,
    paths: config::Paths,
    term: Terminal,
    driver: Driver,
    scene: Scene,
    seed: u64,
    last_lines: Vec<FlowLine>,
    paused: bool,
    show_help: bool,
    should_quit: bool,
    frame_ms: u64,
}

pub(crate) fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut app = App::init(&cli)?;
    let res = app.main_loop();
    // restore the terminal even when the loop errored out
    let cleanup = app.shutdown();
    res.and(cleanup)
}

impl App {
    fn init(cli: &Cli) -> Result<Self> {
        let paths = project_paths()?;
        let mut settings = load_settings(&paths.settings_path);
        settings.apply_cli(cli);
        // persisted files can be hand-edited; keep the knobs in range
        settings.line_count = settings.line_count.clamp(config::MIN_LINES, config::MAX_LINES);
        settings.fps_cap = settings.fps_cap.clamp(config::MIN_FPS, config::MAX_FPS);

        // seed 0 means a fresh field every run
        let seed = if settings.seed == 0 {
            StdRng::from_entropy().next_u64()
        } else {
            settings.seed
        };

        let term = Terminal::begin()?;
        let driver = Driver::new(FlowField::new(seed, settings.line_count));

        Ok(Self {
            settings,
            paths,
            term,
            driver,
            scene: Scene::Field,
            seed,
            last_lines: Vec::new(),
            paused: false,
            show_help: false,
            should_quit: false,
            frame_ms: 0,
        })
    }

    fn main_loop(&mut self) -> Result<()> {
        loop {
            let frame_start = Instant::now();
            let fps = self.settings.fps_cap.clamp(config::MIN_FPS, config::MAX_FPS);
            let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

            let resized = self.term.resize_if_needed()?;
            let (w, h) = self.term.canvas_px();

            // the first real layout mounts the driver; later size changes
            // go through resize, which keeps the batch within a layout class
            if self.scene == Scene::Field && w > 0.0 && h > 0.0 {
                match self.driver.state() {
                    DriverState::Uninitialized => self.driver.mount(w, h),
                    DriverState::Running if resized => self.driver.resize(w, h),
                    _ => {}
                }
            }

            for ev in collect_input_nonblocking(frame_dt)? {
                if let Some(action) = map_event_to_action(self.scene, ev) {
                    self.apply(action);
                }
            }

            let attached = self.scene == Scene::Field && !self.should_quit;
            if attached {
                if !self.paused {
                    if let Some(lines) = self.driver.tick(true) {
                        self.last_lines = lines;
                    }
                }
            } else {
                // the driver sees the surface go away and stops itself
                self.driver.tick(false);
            }

            if self.should_quit {
                return Ok(());
            }

            self.render_frame()?;

            self.frame_ms = frame_start.elapsed().as_millis() as u64;
            spin_sleep(frame_dt, frame_start);
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::TogglePause => self.paused = !self.paused,
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::ToggleTitle => self.settings.show_title = !self.settings.show_title,
            Action::ToggleColor => self.settings.enable_color = !self.settings.enable_color,
            Action::Reseed => self.driver.reseed(),
            Action::LinesUp => self.bump_lines(10),
            Action::LinesDown => self.bump_lines(-10),
            Action::FpsUp => self.bump_fps(10),
            Action::FpsDown => self.bump_fps(-10),
            Action::ToggleAbout => match self.scene {
                Scene::Field => {
                    self.scene = Scene::About;
                    self.last_lines.clear();
                }
                Scene::About => {
                    // a stopped driver never restarts; coming back builds
                    // a new one, which the loop mounts at the current size
                    self.driver =
                        Driver::new(FlowField::new(self.seed, self.settings.line_count));
                    self.scene = Scene::Field;
                }
            },
        }
    }

    fn bump_lines(&mut self, delta: i64) {
        let n = (self.settings.line_count as i64 + delta)
            .clamp(config::MIN_LINES as i64, config::MAX_LINES as i64) as usize;
        self.settings.line_count = n;
        self.driver.set_line_count(n);
    }

    fn bump_fps(&mut self, delta: i64) {
        let f = (self.settings.fps_cap as i64 + delta)
            .clamp(config::MIN_FPS as i64, config::MAX_FPS as i64) as u32;
        self.settings.fps_cap = f;
    }

    fn bg(&self) -> Color {
        if self.settings.enable_color {
            Color::from(BACKDROP)
        } else {
            Color::Black
        }
    }

    fn fg_primary(&self) -> Color {
        if self.settings.enable_color {
            Color::from(TEXT_PRIMARY)
        } else {
            Color::White
        }
    }

    fn fg_faded(&self) -> Color {
        if self.settings.enable_color {
            Color::from(TEXT_FADED)
        } else {
            Color::DarkGrey
        }
    }

    fn render_frame(&mut self) -> Result<()> {
        self.term.cur.clear(self.bg());

        match self.scene {
            Scene::Field => {
                stroke_lines(&mut self.term.canvas, &self.last_lines);
                canvas_to_cells(
                    &self.term.canvas,
                    &mut self.term.cur,
                    self.settings.enable_color,
                    BACKDROP,
                );
                self.draw_title();
            }
            Scene::About => {
                self.draw_center_box(
                    "about",
                    "Flow lines traced through a seeded noise\n\
                     field, smoothed and stroked onto a braille\n\
                     canvas.\n\n\
                     The animation is parked: its driver stopped\n\
                     the moment the canvas left the screen, and\n\
                     going back mounts a fresh one.\n\n\
                     Tab or Esc to go back.",
                );
            }
        }

        if self.show_help {
            self.draw_center_box(
                "flowlines",
                "space  pause / resume\n\
                 r      reseed the field\n\
                 c      color on / off\n\
                 t      title on / off\n\
                 up     more lines\n\
                 down   fewer lines\n\
                 + -    frame cap\n\
                 tab    about page\n\
                 q esc  quit",
            );
        }

        self.draw_status();
        self.term.present(true)
    }

    // On wide layouts the batch leaves the left 30% clear; the title
    // lives in that gap, like a hero heading beside the artwork.
    fn draw_title(&mut self) {
        if !self.settings.show_title {
            return;
        }
        let (w, _) = self.term.canvas_px();
        if FlowField::is_narrow(w) {
            return;
        }
        let bg = self.bg();
        let fg_primary = self.fg_primary();
        let fg_faded = self.fg_faded();
        let y = (canvas_rows(self.term.rows) / 2).saturating_sub(1);
        draw_text(
            &mut self.term.cur,
            3,
            y,
            "F L O W L I N E S",
            fg_primary,
            bg,
        );
        draw_text(
            &mut self.term.cur,
            3,
            y + 1,
            "lines that follow the noise",
            fg_faded,
            bg,
        );
    }

    fn draw_status(&mut self) {
        if self.term.rows == 0 {
            return;
        }
        let (w, _) = self.term.canvas_px();
        let layout = if FlowField::is_narrow(w) { "narrow" } else { "wide" };
        let state = if self.paused {
            "paused"
        } else {
            match self.driver.state() {
                DriverState::Running => "running",
                DriverState::Stopped => "stopped",
                DriverState::Uninitialized => "mounting",
            }
        };
        let line = format!(
            "flowlines [{}] lines:{} seed:{:016x} {} t:{:.0}s {}ms/f  |  q quit  h keys",
            state,
            self.driver.line_count(),
            self.seed,
            layout,
            self.driver.time() / 1000.0,
            self.frame_ms
        );
        let y = self.term.rows - 1;
        let fg = self.fg_faded();
        let bg = self.bg();
        draw_text(&mut self.term.cur, 0, y, &line, fg, bg);
    }

    fn draw_center_box(&mut self, title: &str, body: &str) {
        let (w, h) = (self.term.cols, self.term.rows);
        let bw = min(48, w.saturating_sub(4));
        let bh = min(16, h.saturating_sub(4));
        if bw < 10 || bh < 5 {
            return;
        }
        let x0 = (w - bw) / 2;
        let y0 = (h - bh) / 2;
        let fg = self.fg_primary();
        let fg_faded = self.fg_faded();
        let bg = self.bg();
        let cell = |ch| Cell { ch, fg, bg };

        for y in y0 + 1..y0 + bh - 1 {
            for x in x0 + 1..x0 + bw - 1 {
                self.term.cur.set(x, y, cell(' '));
            }
        }
        for x in x0..x0 + bw {
            self.term.cur.set(x, y0, cell('─'));
            self.term.cur.set(x, y0 + bh - 1, cell('─'));
        }
        for y in y0..y0 + bh {
            self.term.cur.set(x0, y, cell('│'));
            self.term.cur.set(x0 + bw - 1, y, cell('│'));
        }
        self.term.cur.set(x0, y0, cell('┌'));
        self.term.cur.set(x0 + bw - 1, y0, cell('┐'));
        self.term.cur.set(x0, y0 + bh - 1, cell('└'));
        self.term.cur.set(x0 + bw - 1, y0 + bh - 1, cell('┘'));

        draw_text(&mut self.term.cur, x0 + 2, y0 + 1, title, fg, bg);

        let mut yy = y0 + 3;
        for line in body.lines() {
            if yy >= y0 + bh - 1 {
                break;
            }
            draw_text(&mut self.term.cur, x0 + 2, yy, line, fg_faded, bg);
            yy += 1;
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.term.end()?;
        save_settings_atomic(&self.paths.settings_path, &self.settings)?;
        Ok(())
    }
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, now: Instant) {
    let end = now + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
