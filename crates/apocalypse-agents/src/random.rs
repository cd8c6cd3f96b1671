//! Random number streams.
//!
//! Every stochastic rule draws through the [`RandomSource`] trait. The
//! production source is [`StreamRng`], a ChaCha12 generator whose seed is
//! derived from the run seed and the unit of work that uses it: one stream
//! per tick for scheduling decisions, two per occupied cell (one for each
//! pass over the grid) and one per tile for the initial population. Cell
//! streams are keyed by global coordinates, so a cell draws the same numbers
//! whichever tile or worker thread processes it. [`ScriptedRandom`] replays
//! a fixed list of draws and lets tests force individual outcomes.

use std::collections::VecDeque;

use apocalypse_types::{Bearing, Tick};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

/// Odd multipliers that spread the stream coordinates over the seed space.
const TICK_PRIME: u64 = 0x9E37_79B9_7F4A_7C15;
const ROW_PRIME: u64 = 0xC2B2_AE3D_27D4_EB4F;
const COLUMN_PRIME: u64 = 0x1656_67B1_9E37_79F9;
const SCHEDULE_SALT: u64 = 0x27D4_EB2F_1656_67C5;
const FATE_SALT: u64 = 0x85EB_CA77_C2B2_AE63;
const SEEDING_SALT: u64 = 0xFF51_AFD7_ED55_8CCD;

/// A source of uniform and normal variates.
pub trait RandomSource {
    /// A uniform draw from `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// A normal draw with the given mean and standard deviation
    /// (Box-Muller).
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        // 1 - u lies in (0, 1], so the logarithm is finite.
        let u1 = 1.0 - self.uniform();
        let u2 = self.uniform();
        let standard = (-2.0 * u1.ln()).sqrt() * (core::f64::consts::TAU * u2).sin();
        std_dev.mul_add(standard, mean)
    }

    /// A uniform integer from `min ..= max`. Returns `min` when the range
    /// is empty.
    fn uniform_int(&mut self, min: i64, max: i64) -> i64;
}

/// A random bearing of the given magnitude, pointing anywhere.
#[allow(clippy::cast_possible_truncation)]
pub fn random_bearing<R: RandomSource + ?Sized>(rng: &mut R, magnitude: f32) -> Bearing {
    let angle = rng.uniform() * 100.0 * core::f64::consts::PI;
    Bearing::from_polar(angle as f32, magnitude)
}

/// Pick one of `count` alternatives uniformly.
pub fn pick<R: RandomSource + ?Sized>(rng: &mut R, count: usize) -> usize {
    let last = i64::try_from(count.saturating_sub(1)).unwrap_or(i64::MAX);
    usize::try_from(rng.uniform_int(0, last)).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// StreamRng
// ---------------------------------------------------------------------------

/// A deterministic ChaCha12 stream.
#[derive(Debug, Clone)]
pub struct StreamRng {
    inner: ChaCha12Rng,
}

impl StreamRng {
    /// A stream seeded directly from `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: ChaCha12Rng::seed_from_u64(seed),
        }
    }

    /// The stream for scheduling decisions at `tick`, shared by every tile.
    pub fn for_tick(seed: u64, tick: Tick) -> Self {
        Self::from_seed(derive(seed ^ SCHEDULE_SALT, tick, 0, 0))
    }

    /// The stream for infection, birth, mating and movement of the entity
    /// in the global cell `(x, y)` at `tick`.
    pub fn for_cell(seed: u64, tick: Tick, x: usize, y: usize) -> Self {
        Self::from_seed(derive(seed, tick, x, y))
    }

    /// The stream for death, decomposition and turning of the entity in
    /// the global cell `(x, y)` at `tick`.
    pub fn for_fates(seed: u64, tick: Tick, x: usize, y: usize) -> Self {
        Self::from_seed(derive(seed ^ FATE_SALT, tick, x, y))
    }

    /// The stream that places the initial population of tile `tile`.
    pub fn for_seeding(seed: u64, tile: usize) -> Self {
        Self::from_seed(derive(seed ^ SEEDING_SALT, 0, tile, 0))
    }
}

#[allow(clippy::cast_sign_loss)]
fn derive(seed: u64, tick: Tick, x: usize, y: usize) -> u64 {
    seed.wrapping_add((tick as u64).wrapping_mul(TICK_PRIME))
        .wrapping_add((x as u64).wrapping_add(1).wrapping_mul(COLUMN_PRIME))
        .wrapping_add((y as u64).wrapping_add(1).wrapping_mul(ROW_PRIME))
}

impl RandomSource for StreamRng {
    fn uniform(&mut self) -> f64 {
        self.inner.random::<f64>()
    }

    fn uniform_int(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.inner.random_range(min..=max)
    }
}

// ---------------------------------------------------------------------------
// ScriptedRandom
// ---------------------------------------------------------------------------

/// A source that replays scripted uniform draws, then repeats a fallback.
///
/// Integers and normal variates are derived from the uniform draws, so a
/// script fully determines every outcome.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    script: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRandom {
    /// Replay `script`, then return `fallback` forever.
    pub fn new(script: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback,
        }
    }

    /// A source that always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new([], value)
    }

    /// Draws left in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&mut self) -> f64 {
        self.script.pop_front().unwrap_or(self.fallback)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn uniform_int(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max.saturating_sub(min).saturating_add(1);
        let offset = (self.uniform() * span as f64).floor() as i64;
        min.saturating_add(offset.clamp(0, span.saturating_sub(1)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stays_in_unit_interval() {
        let mut rng = StreamRng::from_seed(7);
        for _ in 0..10_000 {
            let u = rng.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn uniform_int_is_inclusive() {
        let mut rng = StreamRng::from_seed(11);
        let mut seen = [false; 4];
        for _ in 0..1_000 {
            let value = rng.uniform_int(3, 6);
            assert!((3..=6).contains(&value));
            seen[usize::try_from(value - 3).unwrap()] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(rng.uniform_int(5, 5), 5);
        assert_eq!(rng.uniform_int(5, 2), 5);
    }

    #[test]
    fn gaussian_has_the_requested_moments() {
        let mut rng = StreamRng::from_seed(3);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| rng.gaussian(270.0, 14.0)).collect();
        let mean = draws.iter().sum::<f64>() / f64::from(n);
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / f64::from(n);
        assert!((mean - 270.0).abs() < 0.5, "mean {mean}");
        assert!((var.sqrt() - 14.0).abs() < 0.5, "sd {}", var.sqrt());
    }

    #[test]
    fn streams_are_reproducible_and_distinct() {
        let a: Vec<f64> = {
            let mut rng = StreamRng::for_cell(42, 5, 0, 3);
            (0..8).map(|_| rng.uniform()).collect()
        };
        let b: Vec<f64> = {
            let mut rng = StreamRng::for_cell(42, 5, 0, 3);
            (0..8).map(|_| rng.uniform()).collect()
        };
        let c: Vec<f64> = {
            let mut rng = StreamRng::for_cell(42, 5, 0, 4);
            (0..8).map(|_| rng.uniform()).collect()
        };
        let d: Vec<f64> = {
            let mut rng = StreamRng::for_tick(42, 5);
            (0..8).map(|_| rng.uniform()).collect()
        };
        let e: Vec<f64> = {
            let mut rng = StreamRng::for_fates(42, 5, 0, 3);
            (0..8).map(|_| rng.uniform()).collect()
        };
        let f: Vec<f64> = {
            let mut rng = StreamRng::for_cell(42, 5, 3, 0);
            (0..8).map(|_| rng.uniform()).collect()
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, f);
        assert_ne!(a, d);
        assert_ne!(a, e);
    }

    #[test]
    fn scripted_source_replays_then_falls_back() {
        let mut rng = ScriptedRandom::new([0.1, 0.9], 0.5);
        assert_eq!(rng.remaining(), 2);
        assert_eq!(rng.uniform(), 0.1);
        assert_eq!(rng.uniform(), 0.9);
        assert_eq!(rng.uniform(), 0.5);
        assert_eq!(ScriptedRandom::constant(0.99).uniform_int(0, 23), 23);
        assert_eq!(ScriptedRandom::constant(0.0).uniform_int(0, 23), 0);
    }

    #[test]
    fn random_bearing_has_fixed_magnitude() {
        let mut rng = StreamRng::from_seed(1);
        for _ in 0..100 {
            let bearing = random_bearing(&mut rng, 0.5);
            assert!((bearing.magnitude() - 0.5).abs() < 1e-5);
        }
    }
}
