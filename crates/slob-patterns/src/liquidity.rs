//! Liquidity-grab (sweep) detection: a single bar crossing a known level,
//! scored on volume spike, wick rejection, and subsequent reversal.

use slob_schemas::{Bar, LiquiditySignal};

pub const DETECTION_THRESHOLD: f64 = 0.6;

const WEIGHT_VOLUME_SPIKE: f64 = 0.4;
const WEIGHT_REJECTION: f64 = 0.3;
const WEIGHT_WICK_REVERSAL: f64 = 0.3;

/// A bar's volume must exceed this multiple of the lookback average to
/// count as a spike.
const VOLUME_SPIKE_MULTIPLE: f64 = 1.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct LiquidityDetector {
    pub lookback: usize,
}

impl LiquidityDetector {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }

    /// Evaluates whether `bars[idx]` constitutes a liquidity grab of `level`
    /// to the upside (`above = true`) or downside. Precondition: the bar's
    /// extreme must actually cross `level` — callers that haven't checked
    /// this get `LiquiditySignal::none()`.
    pub fn detect(&self, bars: &[Bar], idx: usize, level: i64, above: bool) -> LiquiditySignal {
        let Some(bar) = bars.get(idx) else {
            return LiquiditySignal::none();
        };

        let (crossed, break_distance_micros) = if above {
            (bar.high > level, (bar.high - level).max(0))
        } else {
            (bar.low < level, (level - bar.low).max(0))
        };
        if !crossed {
            return LiquiditySignal::none();
        }

        let start = idx.saturating_sub(self.lookback);
        let population = &bars[start..idx];
        let avg_volume = if population.is_empty() {
            bar.volume as f64
        } else {
            population.iter().map(|b| b.volume).sum::<i64>() as f64 / population.len() as f64
        };
        let volume_spike = avg_volume > 0.0 && bar.volume as f64 >= avg_volume * VOLUME_SPIKE_MULTIPLE;

        // Rejection: the bar closed back on the opposite side of the level
        // it swept, i.e. it didn't just break and hold.
        let has_rejection = if above {
            bar.close < level
        } else {
            bar.close > level
        };

        // Wick reversal: the wick on the side of the sweep is more than half
        // the bar's own range, i.e. price poked through and snapped back
        // within the same bar.
        let wick_reversal = if above {
            bar.upper_wick() * 2 > bar.range()
        } else {
            bar.lower_wick() * 2 > bar.range()
        };

        let score = WEIGHT_VOLUME_SPIKE * bool_to_f64(volume_spike)
            + WEIGHT_REJECTION * bool_to_f64(has_rejection)
            + WEIGHT_WICK_REVERSAL * bool_to_f64(wick_reversal);

        LiquiditySignal {
            detected: score >= DETECTION_THRESHOLD,
            score,
            break_distance_micros,
            volume_spike,
            has_rejection,
            wick_reversal,
        }
    }

    /// Scans `[start, end]` for the first bar that crosses `level`,
    /// returning its index and signal regardless of whether it scored
    /// above the detection threshold.
    pub fn find_in_window(
        &self,
        bars: &[Bar],
        start: usize,
        end: usize,
        level: i64,
        above: bool,
    ) -> Option<(usize, LiquiditySignal)> {
        for idx in start..=end.min(bars.len().saturating_sub(1)) {
            let signal = self.detect(bars, idx, level, above);
            if signal.detected {
                return Some((idx, signal));
            }
        }
        None
    }

    /// Scans `[start, end]` and returns the highest-scoring crossing bar,
    /// regardless of whether any single bar reached the detection
    /// threshold — used when the caller wants the best candidate, not
    /// the first one that clears the bar.
    pub fn best_in_window(
        &self,
        bars: &[Bar],
        start: usize,
        end: usize,
        level: i64,
        above: bool,
    ) -> Option<(usize, LiquiditySignal)> {
        let mut best: Option<(usize, LiquiditySignal)> = None;
        for idx in start..=end.min(bars.len().saturating_sub(1)) {
            let signal = self.detect(bars, idx, level, above);
            if signal.score <= 0.0 {
                continue;
            }
            if best.as_ref().map(|(_, b)| signal.score > b.score).unwrap_or(true) {
                best = Some((idx, signal));
            }
        }
        best
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
