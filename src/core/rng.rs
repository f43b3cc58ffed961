use std::f64::consts::PI;
use std::sync::Arc;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::dates::{Clock, SystemClock};

/// Per-run seed from the batch seed and run index, independent of scheduling.
pub fn derive_seed(base_seed: u64, run_index: u64) -> u64 {
    splitmix64(base_seed ^ run_index.wrapping_mul(0xD1B5_4A32_D192_ED03))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Random stream used by the samplers. Any `RngCore` can back it.
pub struct SimRng<R = ChaCha8Rng> {
    inner: R,
    cached_normal: Option<f64>,
}

impl SimRng<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: RngCore> SimRng<R> {
    pub fn from_rng(inner: R) -> Self {
        Self {
            inner,
            cached_normal: None,
        }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.inner.r#gen::<f64>()
    }

    /// Uniform index in `0..len`; `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.inner.gen_range(0..len)
    }

    /// Box–Muller; the second variate of each pair is kept for the next call.
    pub fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        let z0 = r * theta.cos();
        let z1 = r * theta.sin();
        self.cached_normal = Some(z1);
        z0
    }

    /// Standard normal clamped to ±`limit` deviations.
    pub fn clamped_normal(&mut self, limit: f64) -> f64 {
        self.standard_normal().clamp(-limit, limit)
    }
}

/// Where an unseeded batch gets its seed.
pub trait SeedSource: Send + Sync {
    fn seed(&self) -> u64;
}

pub struct ClockSeed(pub Arc<dyn Clock>);

impl Default for ClockSeed {
    fn default() -> Self {
        Self(Arc::new(SystemClock))
    }
}

impl SeedSource for ClockSeed {
    fn seed(&self) -> u64 {
        self.0.seed_nanos()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedSeed(pub u64);

impl SeedSource for FixedSeed {
    fn seed(&self) -> u64 {
        self.0
    }
}
