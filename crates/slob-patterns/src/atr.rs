//! Average True Range, computed over a bounded lookback window so detectors
//! stay O(1) per bar instead of re-scanning the whole session.

use slob_schemas::Bar;

pub const DEFAULT_PERIOD: usize = 14;
pub const DEFAULT_LOOKBACK: usize = 30;

/// Result of an ATR query at a given bar index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtrReading {
    pub value_micros: i64,
    /// False when fewer than `period` true-range samples were available —
    /// callers must treat the zero value as "unknown", not "flat".
    pub sufficient_data: bool,
}

impl AtrReading {
    pub fn zero() -> Self {
        Self {
            value_micros: 0,
            sufficient_data: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AtrCalculator {
    pub period: usize,
    pub lookback: usize,
}

impl Default for AtrCalculator {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            lookback: DEFAULT_LOOKBACK,
        }
    }
}

impl AtrCalculator {
    pub fn new(period: usize, lookback: usize) -> Self {
        Self { period, lookback }
    }

    /// ATR as of `bars[end_idx]` inclusive, using a simple moving average of
    /// true range over the last `period` bars within the `lookback` window.
    pub fn atr_at(&self, bars: &[Bar], end_idx: usize) -> AtrReading {
        if end_idx >= bars.len() {
            return AtrReading::zero();
        }
        // True range needs a previous close, so the first usable sample is
        // index 1; cap how far back we walk by `lookback`.
        let earliest = end_idx.saturating_sub(self.lookback.max(self.period));
        let start = earliest.max(1);

        let mut trs = Vec::with_capacity(self.period);
        for i in start..=end_idx {
            trs.push(true_range_micros(&bars[i], &bars[i - 1]));
        }

        if trs.len() < self.period {
            // Not enough history yet; report what we have as a best-effort
            // mean but flag insufficiency so callers don't trust it blindly.
            if trs.is_empty() {
                return AtrReading::zero();
            }
            let mean = trs.iter().sum::<i64>() / trs.len() as i64;
            return AtrReading {
                value_micros: mean,
                sufficient_data: false,
            };
        }

        let window = &trs[trs.len() - self.period..];
        let mean = window.iter().sum::<i64>() / self.period as i64;
        AtrReading {
            value_micros: mean,
            sufficient_data: true,
        }
    }
}

fn true_range_micros(current: &Bar, previous: &Bar) -> i64 {
    let hl = current.high - current.low;
    let hc = (current.high - previous.close).abs();
    let lc = (current.low - previous.close).abs();
    hl.max(hc).max(lc)
}
