//! Injected randomness
//!
//! Every random decision in the engine (admission draws, coin-flip counts,
//! uniform picks, candidate shuffles) goes through a [`RandomSource`] so that
//! tests can seed or script it.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniform random numbers.
pub trait RandomSource: Send + Sync {
    /// Uniform value in `[0, 1)`.
    fn next_f64(&self) -> f64;

    /// Uniform index in `[0, n)`. `n` must be non-zero.
    fn next_index(&self, n: usize) -> usize {
        let idx = (self.next_f64() * n as f64) as usize;
        idx.min(n.saturating_sub(1))
    }

    /// True with probability `p`. `p >= 1` never draws.
    fn chance(&self, p: f64) -> bool {
        if p >= 1.0 {
            return true;
        }
        if p <= 0.0 {
            return false;
        }
        self.next_f64() < p
    }

    /// Fair coin between `a` and `b`.
    fn coin(&self, a: usize, b: usize) -> usize {
        if self.next_f64() < 0.5 {
            a
        } else {
            b
        }
    }
}

/// Uniformly pick one element.
pub fn pick<'a, T>(rng: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        items.get(rng.next_index(items.len()))
    }
}

/// Fisher-Yates shuffle in place.
pub fn shuffle<T>(rng: &dyn RandomSource, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.next_index(i + 1);
        items.swap(i, j);
    }
}

// ─────────────────────────────────────────────────────────────────
// StdRandom
// ─────────────────────────────────────────────────────────────────

/// `StdRng`-backed source; seedable for reproducible runs.
pub struct StdRandom {
    rng: Mutex<StdRng>,
}

impl StdRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeded when `seed` is set, entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::from_seed(s),
            None => Self::from_entropy(),
        }
    }
}

impl RandomSource for StdRandom {
    fn next_f64(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }

    fn next_index(&self, n: usize) -> usize {
        self.rng.lock().gen_range(0..n.max(1))
    }
}

// ─────────────────────────────────────────────────────────────────
// SequenceRandom
// ─────────────────────────────────────────────────────────────────

/// Replays a fixed list of values, then repeats `fallback` forever.
///
/// `0.0` means "first option / admit", values close to `1.0` mean "last
/// option / reject".
pub struct SequenceRandom {
    values: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl SequenceRandom {
    pub fn new(values: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            fallback: fallback.clamp(0.0, 0.999_999),
        }
    }

    /// Always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(std::iter::empty(), value)
    }

    /// Values not yet consumed.
    pub fn remaining(&self) -> usize {
        self.values.lock().len()
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&self) -> f64 {
        self.values
            .lock()
            .pop_front()
            .map(|v| v.clamp(0.0, 0.999_999))
            .unwrap_or(self.fallback)
    }
}
