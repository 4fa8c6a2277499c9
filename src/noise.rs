use rand::{rngs::StdRng, Rng, SeedableRng};

/// Classic 2D gradient noise over a shuffled permutation table.
///
/// The table is fixed at construction, so `sample` is a pure function of
/// its arguments: one seed gives one field for the life of the value.
pub(crate) struct Noise2 {
    // 256 entries doubled so the corner lookups never wrap mid-index.
    perm: [u8; 512],
}

impl Noise2 {
    pub(crate) fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = i as u8;
        }
        // Fisher-Yates
        for i in (1..256).rev() {
            let j = rng.gen_range(0..=i);
            table.swap(i, j);
        }

        let mut perm = [0u8; 512];
        perm[..256].copy_from_slice(&table);
        perm[256..].copy_from_slice(&table);
        Self { perm }
    }

    /// Smooth scalar field, values in [-1, 1].
    pub(crate) fn sample(&self, x: f32, y: f32) -> f32 {
        let xf = x.floor();
        let yf = y.floor();
        let xi = (xf as i32 & 255) as usize;
        let yi = (yf as i32 & 255) as usize;
        let fx = x - xf;
        let fy = y - yf;

        let u = fade(fx);
        let v = fade(fy);

        let a = self.perm[xi] as usize + yi;
        let b = self.perm[xi + 1] as usize + yi;

        let n00 = grad(self.perm[a], fx, fy);
        let n10 = grad(self.perm[b], fx - 1.0, fy);
        let n01 = grad(self.perm[a + 1], fx, fy - 1.0);
        let n11 = grad(self.perm[b + 1], fx - 1.0, fy - 1.0);

        lerp(lerp(n00, n10, u), lerp(n01, n11, u), v)
    }
}

// Quintic fade: first and second derivative vanish at 0 and 1, so cell
// boundaries stay seam-free.
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

// Diagonal gradient picked by the low two hash bits.
fn grad(hash: u8, x: f32, y: f32) -> f32 {
    let h = hash & 3;
    let u = if h < 2 { x } else { y };
    let v = if h < 2 { y } else { x };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}
