//! Random family for scripts.
//!
//! One generator per engine session, seeded once. It is only ever called from
//! script code, which runs on the producer thread (or on the control thread
//! while priming, before the producer exists).

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SignalRng {
    rng: SmallRng,
}

impl SignalRng {
    /// Seeded generator; `None` draws the seed from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_entropy(),
        };
        Self { rng }
    }

    /// Uniform in [0, 1).
    #[inline]
    pub fn random(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform in [0, max) (or (max, 0] for negative `max`).
    #[inline]
    pub fn random_max(&mut self, max: f64) -> f64 {
        self.random() * max
    }

    /// Uniform in [min, max]; bounds given in either order.
    ///
    /// Non-finite bounds (or a span that overflows) yield NaN, which the
    /// producer renders as silence.
    pub fn random_range(&mut self, min: f64, max: f64) -> f64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if !(hi - lo).is_finite() {
            return f64::NAN;
        }
        if lo == hi {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform integer in [0, max] (or [max, 0]).
    #[inline]
    pub fn random_int(&mut self, max: i64) -> i64 {
        self.random_int_range(0, max)
    }

    /// Uniform integer in [min, max]; bounds given in either order.
    pub fn random_int_range(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.rng.gen_range(lo..=hi)
    }
}
