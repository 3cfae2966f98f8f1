//! Price correction for flagged items.
//!
//! A flagged price is pulled back to 80% of the band tolerance on its side of
//! the target, then nudged further inward by a random 1..=10 currency units so
//! corrected prices do not all sit on one line.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::band::Band;
use crate::deviation::Evaluation;

/// Fraction of the tolerance the corrected price is placed at.
pub const PULLBACK: f64 = 0.8;

pub const JITTER_MIN: f64 = 1.0;
pub const JITTER_MAX: f64 = 10.0;

/// Source of the jitter term added to corrected prices.
pub trait Jitter {
    /// A value in `[JITTER_MIN, JITTER_MAX]`.
    fn draw(&mut self) -> f64;
}

/// Uniform jitter backed by a `rand` generator.
pub struct RandomJitter<R> {
    rng: R,
}

impl<R: Rng> RandomJitter<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomJitter<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> Jitter for RandomJitter<R> {
    fn draw(&mut self) -> f64 {
        self.rng.gen_range(JITTER_MIN..=JITTER_MAX)
    }
}

/// Always returns the same offset.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn draw(&mut self) -> f64 {
        self.0
    }
}

/// Round half away from zero to two decimal places.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Replacement price for an item given its before-pass evaluation.
///
/// Unflagged items, and the unreachable flagged-at-zero-deviation case, keep
/// their current price. Jitter is only drawn for items that move. Prices never
/// go below zero, even when the jitter exceeds a tiny target.
pub fn corrected_price(
    current_price: f64,
    target_price: f64,
    band: Band,
    evaluation: Evaluation,
    jitter: &mut dyn Jitter,
) -> f64 {
    if !evaluation.flagged {
        return current_price;
    }
    let tolerance = band.tolerance();
    if evaluation.deviation > 0.0 {
        round_cents(target_price * (1.0 + PULLBACK * tolerance) - jitter.draw()).max(0.0)
    } else if evaluation.deviation < 0.0 {
        round_cents(target_price * (1.0 - PULLBACK * tolerance) + jitter.draw())
    } else {
        current_price
    }
}
