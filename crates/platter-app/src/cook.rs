use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Shape of the kitchen's service-time distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookDistribution {
    /// Uniform draw over `[min_ms, max_ms]`.
    Uniform,
    /// Exponential draw around a mean, clamped to `[min_ms, max_ms]`.
    Exponential,
}

/// Deterministic service-time generator for the demo server.
///
/// Seeded so an experiment's cook times are reproducible alongside the
/// channel's impairment draws.
#[derive(Debug)]
pub struct CookModel {
    min_ms: u32,
    max_ms: u32,
    dist: CookDistribution,
    mean_ms: f64,
    rng: StdRng,
}

impl CookModel {
    /// Builds a model over `[min_ms, max_ms]`.
    ///
    /// For the exponential shape, a `mean_ms` of 0 falls back to the
    /// midpoint of the range.
    pub fn new(
        min_ms: u32,
        max_ms: u32,
        dist: CookDistribution,
        mean_ms: f64,
        seed: u64,
    ) -> Self {
        let max_ms = max_ms.max(min_ms);
        let mean_ms = if mean_ms > 0.0 {
            mean_ms
        } else {
            f64::from(min_ms + max_ms) / 2.0
        };
        Self { min_ms, max_ms, dist, mean_ms, rng: StdRng::seed_from_u64(seed) }
    }

    /// Draws the next cook time.
    pub fn draw(&mut self) -> Duration {
        let ms = match self.dist {
            CookDistribution::Uniform => f64::from(self.rng.gen_range(self.min_ms..=self.max_ms)),
            CookDistribution::Exponential => {
                let u: f64 = self.rng.gen_range(0.0..1.0);
                let drawn = -self.mean_ms * (1.0 - u).ln();
                drawn.clamp(f64::from(self.min_ms), f64::from(self.max_ms))
            }
        };
        Duration::from_millis(ms as u64)
    }
}
