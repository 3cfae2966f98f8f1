use serde::Serialize;

use crate::band::Band;

/// Result of comparing one price against its target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    /// Signed fraction `(price - target) / target`.
    pub deviation: f64,
    /// `|deviation| >= band tolerance`.
    pub flagged: bool,
}

/// Signed fractional deviation. A zero target yields 0 rather than dividing.
pub fn deviation(price: f64, target: f64) -> f64 {
    if target != 0.0 {
        (price - target) / target
    } else {
        0.0
    }
}

/// Pure function of its inputs; safe to re-run after a price changes.
pub fn evaluate(price: f64, target: f64, band: Band) -> Evaluation {
    let deviation = deviation(price, target);
    Evaluation {
        deviation,
        flagged: deviation.abs() >= band.tolerance(),
    }
}
