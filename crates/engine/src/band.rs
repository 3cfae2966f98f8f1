//! Price bands and their deviation tolerances.
//!
//! Seven right-open intervals cover `[0, ∞)`: a price sitting exactly on a
//! boundary belongs to the higher band.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Band {
    #[serde(rename = "<500")]
    A,
    #[serde(rename = "500-1000")]
    B,
    #[serde(rename = "1000-2000")]
    C,
    #[serde(rename = "2000-5000")]
    D,
    #[serde(rename = "5000-7500")]
    E,
    #[serde(rename = "7500-20000")]
    F,
    #[serde(rename = ">20000")]
    G,
}

/// Price handed to [`classify`] that is negative, NaN or infinite.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("price {0} is not a non-negative finite number")]
pub struct InvalidPrice(pub f64);

impl Band {
    /// All bands in ascending price order.
    pub const ALL: [Band; 7] = [Band::A, Band::B, Band::C, Band::D, Band::E, Band::F, Band::G];

    pub fn label(self) -> &'static str {
        match self {
            Self::A => "<500",
            Self::B => "500-1000",
            Self::C => "1000-2000",
            Self::D => "2000-5000",
            Self::E => "5000-7500",
            Self::F => "7500-20000",
            Self::G => ">20000",
        }
    }

    /// Maximum acceptable |deviation| for items in this band, as a fraction.
    pub fn tolerance(self) -> f64 {
        match self {
            Self::A => 0.25,
            Self::B => 0.20,
            Self::C => 0.15,
            Self::D => 0.10,
            Self::E => 0.06,
            Self::F => 0.05,
            Self::G => 0.04,
        }
    }

    /// Inclusive lower bound.
    pub fn lower(self) -> f64 {
        match self {
            Self::A => 0.0,
            Self::B => 500.0,
            Self::C => 1000.0,
            Self::D => 2000.0,
            Self::E => 5000.0,
            Self::F => 7500.0,
            Self::G => 20000.0,
        }
    }

    /// Exclusive upper bound; `None` for the open-ended top band.
    pub fn upper(self) -> Option<f64> {
        match self {
            Self::G => None,
            other => Some(Self::ALL[other.index() + 1].lower()),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn contains(self, price: f64) -> bool {
        price >= self.lower() && self.upper().map_or(true, |upper| price < upper)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a price to its band.
pub fn classify(price: f64) -> Result<Band, InvalidPrice> {
    if !price.is_finite() || price < 0.0 {
        return Err(InvalidPrice(price));
    }
    Ok(Band::ALL
        .iter()
        .rev()
        .copied()
        .find(|band| price >= band.lower())
        .unwrap_or(Band::A))
}
