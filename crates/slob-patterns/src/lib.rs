//! Pattern detection: ATR, consolidation, no-wick, and liquidity-grab
//! detectors, plus the `PatternFinder` that chains them into full 5/1 SLOB
//! setup candidates. Every detector here is pure — no engine state, no IO.

pub mod atr;
pub mod consolidation;
pub mod finder;
pub mod liquidity;
pub mod nowick;

pub use atr::{AtrCalculator, AtrReading};
pub use consolidation::ConsolidationDetector;
pub use finder::{LseRange, PatternFinder};
pub use liquidity::LiquidityDetector;
pub use nowick::{NoWickDetector, NoWickReading};
