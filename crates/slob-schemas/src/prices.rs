//! Integer-micros price representation.
//!
//! All prices that cross a detector, state-machine, or risk boundary are
//! represented as `i64` integer micros (1 point = 1_000_000 micros). This
//! keeps consolidation/ATR/SL-TP comparisons exact instead of drifting at
//! the nth decimal place the way `f64` prices do over a long backtest.
//!
//! `f64` only appears at the wire boundary (broker JSON, CSV/report output,
//! ML feature vectors) via [`micros_to_f64`] / [`f64_to_micros`].

use serde::{Deserialize, Serialize};

/// Scale factor: 1 price point = 1_000_000 micros (6 decimal places).
pub const MICROS_PER_POINT: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingError {
    NotFinite,
    OutOfRange,
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::NotFinite => write!(f, "f64_to_micros: non-finite input (NaN or Inf)"),
            PricingError::OutOfRange => {
                write!(f, "f64_to_micros: price out of i64 range after scaling")
            }
        }
    }
}

impl std::error::Error for PricingError {}

/// Convert integer micros to `f64`, for wire/report/feature-vector boundaries.
pub fn micros_to_f64(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_POINT as f64
}

/// Convert an `f64` price (e.g. parsed from a bar CSV row) into integer micros.
/// Rounds to the nearest micro to avoid systematic truncation bias.
pub fn f64_to_micros(price: f64) -> Result<i64, PricingError> {
    if !price.is_finite() {
        return Err(PricingError::NotFinite);
    }
    let scaled = price * MICROS_PER_POINT as f64;
    if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
        return Err(PricingError::OutOfRange);
    }
    Ok(scaled.round() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}
