use crate::noise::Noise2;
use crate::render::Rgb;
use rand::{rngs::StdRng, Rng, SeedableRng};

// Field tuning, all in logical canvas pixels.
pub(crate) const NOISE_SCALE: f32 = 0.004; // px -> noise space
pub(crate) const STEP_SIZE: f32 = 4.0; // advance per trace step
pub(crate) const MAX_POINTS: usize = 120; // steps per line and frame
pub(crate) const EDGE_MARGIN: f32 = 100.0; // off-canvas slack before a trace exits
const TIME_SCALE: f32 = 0.0003; // ms of animation time -> noise drift
const MIN_POINTS: usize = 5; // traces at or below this are dropped

// Below this width the layout is a single column and lines may spawn
// anywhere; at or above it the left 30% stays clear for overlaid text.
pub(crate) const WIDE_LAYOUT_MIN_PX: f32 = 768.0;

// Monokai accents, handed out round-robin.
pub(crate) const PALETTE: [Rgb; 5] = [
    Rgb::new(0xf9, 0x26, 0x72), // pink
    Rgb::new(0x66, 0xd9, 0xef), // cyan
    Rgb::new(0xa6, 0xe2, 0x2e), // green
    Rgb::new(0xae, 0x81, 0xff), // purple
    Rgb::new(0xfd, 0x97, 0x1f), // orange
];

/// Where a line starts and how it is styled. Fixed between
/// re-initializations; only the traced path moves per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LineSeed {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) color: Rgb,
    pub(crate) opacity: f32,
    pub(crate) width: f32,
}

/// One traced polyline, ready to stroke.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FlowLine {
    pub(crate) points: Vec<(f32, f32)>,
    pub(crate) color: Rgb,
    pub(crate) opacity: f32,
    pub(crate) width: f32,
}

pub(crate) struct FlowField {
    noise: Noise2,
    rng: StdRng,
    line_count: usize,
    seeds: Vec<LineSeed>,
    last_init_width: Option<f32>,
}

impl FlowField {
    pub(crate) fn new(seed: u64, line_count: usize) -> Self {
        Self {
            noise: Noise2::new(seed),
            // decouple placement draws from the table shuffle
            rng: StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15),
            line_count,
            seeds: Vec::new(),
            last_init_width: None,
        }
    }

    pub(crate) fn is_narrow(width: f32) -> bool {
        width < WIDE_LAYOUT_MIN_PX
    }

    /// (Re)places the seed batch. Does nothing unless this is the first
    /// call, `force` is set, or the width crossed the layout boundary
    /// since the previous call. Returns whether seeds were replaced.
    pub(crate) fn initialize(&mut self, width: f32, height: f32, force: bool) -> bool {
        let crossed = match self.last_init_width {
            Some(prev) => Self::is_narrow(prev) != Self::is_narrow(width),
            None => false,
        };
        if !self.seeds.is_empty() && !force && !crossed {
            return false;
        }
        self.last_init_width = Some(width);

        let narrow = Self::is_narrow(width);
        let start_x = if narrow { 0.0 } else { width * 0.3 };
        let range_x = if narrow { width } else { width * 0.7 };

        self.seeds.clear();
        for i in 0..self.line_count {
            self.seeds.push(LineSeed {
                x: start_x + self.rng.gen_range(0.0..range_x),
                y: self.rng.gen_range(0.0..height),
                color: PALETTE[i % PALETTE.len()],
                opacity: 0.2 + self.rng.gen_range(0.0..0.6),
                width: 1.0 + self.rng.gen_range(0.0..2.5),
            });
        }
        true
    }

    pub(crate) fn line_count(&self) -> usize {
        self.line_count
    }

    pub(crate) fn set_line_count(&mut self, n: usize) {
        self.line_count = n;
    }

    /// Traces every seed through the noise field at animation time `time`
    /// (milliseconds). Pure in (seeds, width, height, time): no state is
    /// touched, so one frame can be retraced bit-for-bit.
    pub(crate) fn trace(&self, width: f32, height: f32, time: f32) -> Vec<FlowLine> {
        let t = time * TIME_SCALE;
        // whole-batch drift of the start points, distinct phase per axis
        let drift_x = (t * 2.0).sin() * 30.0;
        let drift_y = (t * 1.5).cos() * 20.0;

        let mut lines = Vec::with_capacity(self.seeds.len());
        for seed in &self.seeds {
            let mut x = seed.x + drift_x;
            let mut y = seed.y + drift_y;
            let mut points = Vec::with_capacity(MAX_POINTS + 1);
            points.push((x, y));

            for _ in 0..MAX_POINTS {
                let n = self
                    .noise
                    .sample(x * NOISE_SCALE + t, y * NOISE_SCALE + t * 0.7);
                let angle = n * std::f32::consts::PI * 3.0;
                x += angle.cos() * STEP_SIZE;
                y += angle.sin() * STEP_SIZE;
                if x < -EDGE_MARGIN
                    || x > width + EDGE_MARGIN
                    || y < -EDGE_MARGIN
                    || y > height + EDGE_MARGIN
                {
                    break;
                }
                points.push((x, y));
            }

            // a handful of points is not worth stroking
            if points.len() > MIN_POINTS {
                lines.push(FlowLine {
                    points,
                    color: seed.color,
                    opacity: seed.opacity,
                    width: seed.width,
                });
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(f: &FlowField) -> Vec<(f32, f32)> {
        f.seeds.iter().map(|s| (s.x, s.y)).collect()
    }

    #[test]
    fn first_initialize_places_all_seeds() {
        let mut f = FlowField::new(1, 60);
        assert!(f.initialize(1024.0, 768.0, false));
        assert_eq!(f.seeds.len(), 60);
    }

    #[test]
    fn initialize_without_force_is_idempotent() {
        let mut f = FlowField::new(1, 60);
        f.initialize(1024.0, 768.0, false);
        let before = positions(&f);
        assert!(!f.initialize(1024.0, 768.0, false));
        assert_eq!(before, positions(&f));
    }

    #[test]
    fn force_replaces_seeds() {
        let mut f = FlowField::new(2, 60);
        f.initialize(1024.0, 768.0, false);
        let before = positions(&f);
        assert!(f.initialize(1024.0, 768.0, true));
        assert_ne!(before, positions(&f));
    }

    #[test]
    fn crossing_layout_boundary_replaces_seeds() {
        let mut f = FlowField::new(3, 60);
        f.initialize(700.0, 600.0, false);
        let before = positions(&f);
        assert!(f.initialize(800.0, 600.0, false));
        assert_ne!(before, positions(&f));
    }

    #[test]
    fn resize_within_layout_class_keeps_seeds() {
        let mut f = FlowField::new(3, 60);
        f.initialize(700.0, 600.0, false);
        let before = positions(&f);
        assert!(!f.initialize(720.0, 600.0, false));
        assert_eq!(before, positions(&f));
    }

    #[test]
    fn wide_layout_keeps_left_third_clear() {
        let mut f = FlowField::new(4, 60);
        let (w, h) = (1024.0f32, 768.0f32);
        f.initialize(w, h, false);
        for s in &f.seeds {
            assert!(s.x >= w * 0.3, "seed at x = {}", s.x);
            assert!(s.x <= w * 0.3 + w * 0.7, "seed at x = {}", s.x);
            assert!((0.0..h).contains(&s.y), "seed at y = {}", s.y);
        }
    }

    #[test]
    fn narrow_layout_uses_full_width() {
        let mut f = FlowField::new(5, 60);
        f.initialize(500.0, 800.0, false);
        for s in &f.seeds {
            assert!((0.0..500.0).contains(&s.x), "seed at x = {}", s.x);
            assert!((0.0..800.0).contains(&s.y), "seed at y = {}", s.y);
        }
    }

    #[test]
    fn styles_come_from_the_palette_in_order() {
        let mut f = FlowField::new(6, 12);
        f.initialize(1024.0, 768.0, false);
        for (i, s) in f.seeds.iter().enumerate() {
            assert_eq!(s.color, PALETTE[i % PALETTE.len()]);
            assert!((0.2..0.8).contains(&s.opacity), "opacity {}", s.opacity);
            assert!((1.0..3.5).contains(&s.width), "width {}", s.width);
        }
    }

    #[test]
    fn trace_is_pure() {
        let mut f = FlowField::new(7, 40);
        f.initialize(1024.0, 768.0, false);
        let a = f.trace(1024.0, 768.0, 160.0);
        let b = f.trace(1024.0, 768.0, 160.0);
        assert_eq!(a, b);
    }

    #[test]
    fn traces_differ_over_time() {
        let mut f = FlowField::new(8, 40);
        f.initialize(1024.0, 768.0, false);
        let a = f.trace(1024.0, 768.0, 0.0);
        let b = f.trace(1024.0, 768.0, 1600.0);
        assert_ne!(a, b);
    }

    #[test]
    fn line_styles_match_their_seeds() {
        let mut f = FlowField::new(9, 40);
        f.initialize(1024.0, 768.0, false);
        let lines = f.trace(1024.0, 768.0, 0.0);
        assert!(!lines.is_empty());
        for line in &lines {
            let matched = f.seeds.iter().any(|s| {
                s.color == line.color && s.opacity == line.opacity && s.width == line.width
            });
            assert!(matched);
        }
    }

    #[test]
    fn stub_traces_are_dropped() {
        let mut f = FlowField::new(10, 1);
        f.initialize(1024.0, 768.0, false);
        // move the only seed far outside the margin: its trace exits on
        // the first step and never reaches six points
        f.seeds[0].x = 5000.0;
        f.seeds[0].y = 5000.0;
        assert!(f.trace(1024.0, 768.0, 0.0).is_empty());
    }

    #[test]
    fn same_seed_same_batch() {
        let mut a = FlowField::new(11, 30);
        let mut b = FlowField::new(11, 30);
        a.initialize(1024.0, 768.0, false);
        b.initialize(1024.0, 768.0, false);
        assert_eq!(a.seeds, b.seeds);
        assert_eq!(a.trace(1024.0, 768.0, 320.0), b.trace(1024.0, 768.0, 320.0));
    }
}
