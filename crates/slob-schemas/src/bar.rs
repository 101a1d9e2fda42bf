use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarError {
    /// `high` was not the maximum of the four prices.
    HighNotMax,
    /// `low` was not the minimum of the four prices.
    LowNotMin,
}

impl std::fmt::Display for BarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarError::HighNotMax => write!(f, "bar high is not >= open/close/low"),
            BarError::LowNotMin => write!(f, "bar low is not <= open/close/high"),
        }
    }
}

impl std::error::Error for BarError {}

/// A single OHLCV candle, closing at `ts_close_utc`, prices in integer
/// micros. Wick/body/range are derived, never stored, so they can never
/// drift out of sync with the four prices they come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub ts_close_utc: DateTime<Utc>,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub volume: i64,
}

impl Bar {
    /// Builds a bar, rejecting OHLC quadruples where `high`/`low` don't
    /// bound `open`/`close` — a malformed upstream feed must fail loudly
    /// here rather than corrupt every downstream wick computation.
    pub fn new(
        ts_close_utc: DateTime<Utc>,
        open: i64,
        high: i64,
        low: i64,
        close: i64,
        volume: i64,
    ) -> Result<Self, BarError> {
        if high < open || high < close || high < low {
            return Err(BarError::HighNotMax);
        }
        if low > open || low > close || low > high {
            return Err(BarError::LowNotMin);
        }
        Ok(Bar {
            ts_close_utc,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> i64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> i64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> i64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> i64 {
        self.open.min(self.close) - self.low
    }
}

/// A chronologically ordered, append-only sequence of bars for one symbol.
/// Indices into a `BarStore` are the stable integer handles used throughout
/// `slob-patterns` (`liq1_idx`, `consol_end_idx`, ...) — callers never hold
/// timestamps as the primary key.
#[derive(Debug, Clone, Default)]
pub struct BarStore {
    symbol: String,
    bars: Vec<Bar>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarStoreError {
    /// A new bar's `ts_close_utc` was not strictly after the last bar's.
    NonMonotonicTimestamp,
}

impl std::fmt::Display for BarStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarStoreError::NonMonotonicTimestamp => {
                write!(f, "bar timestamps must be strictly increasing")
            }
        }
    }
}

impl std::error::Error for BarStoreError {}

impl BarStore {
    pub fn new(symbol: impl Into<String>) -> Self {
        BarStore {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Appends `bar`, or silently no-ops if its timestamp exactly duplicates
    /// the last bar's (idempotent re-delivery from an upstream feed).
    /// Returns `Ok(None)` for that dropped-duplicate case, `Ok(Some(idx))`
    /// on a genuine append, and rejects any timestamp strictly earlier than
    /// the last bar's.
    pub fn push(&mut self, bar: Bar) -> Result<Option<usize>, BarStoreError> {
        if let Some(last) = self.bars.last() {
            if bar.ts_close_utc < last.ts_close_utc {
                return Err(BarStoreError::NonMonotonicTimestamp);
            }
            if bar.ts_close_utc == last.ts_close_utc {
                return Ok(None);
            }
        }
        self.bars.push(bar);
        Ok(Some(self.bars.len() - 1))
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Bar> {
        self.bars.get(idx)
    }

    pub fn as_slice(&self) -> &[Bar] {
        &self.bars
    }

    pub fn slice(&self, start: usize, end: usize) -> &[Bar] {
        &self.bars[start..end.min(self.bars.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn bar_rejects_high_below_close() {
        let err = Bar::new(ts(0), 100, 99, 90, 105, 1000).unwrap_err();
        assert_eq!(err, BarError::HighNotMax);
    }

    #[test]
    fn bar_rejects_low_above_open() {
        let err = Bar::new(ts(0), 100, 110, 101, 105, 1000).unwrap_err();
        assert_eq!(err, BarError::LowNotMin);
    }

    #[test]
    fn wick_and_body_are_derived_correctly() {
        let bar = Bar::new(ts(0), 100, 120, 90, 110, 1000).unwrap();
        assert_eq!(bar.body(), 10);
        assert_eq!(bar.upper_wick(), 10);
        assert_eq!(bar.lower_wick(), 10);
        assert_eq!(bar.range(), 30);
        assert!(bar.is_bullish());
    }

    #[test]
    fn bar_store_rejects_non_monotonic_push() {
        let mut store = BarStore::new("NQ");
        store.push(Bar::new(ts(10), 1, 2, 0, 1, 10).unwrap()).unwrap();
        let err = store
            .push(Bar::new(ts(5), 1, 2, 0, 1, 10).unwrap())
            .unwrap_err();
        assert_eq!(err, BarStoreError::NonMonotonicTimestamp);
    }

    #[test]
    fn bar_store_indices_are_stable_handles() {
        let mut store = BarStore::new("NQ");
        let i0 = store.push(Bar::new(ts(1), 1, 2, 0, 1, 10).unwrap()).unwrap().unwrap();
        let i1 = store.push(Bar::new(ts(2), 1, 2, 0, 1, 10).unwrap()).unwrap().unwrap();
        assert_eq!(i0, 0);
        assert_eq!(i1, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn bar_store_drops_exact_duplicate_timestamp_silently() {
        let mut store = BarStore::new("NQ");
        store.push(Bar::new(ts(10), 1, 2, 0, 1, 10).unwrap()).unwrap();
        let dup = store
            .push(Bar::new(ts(10), 1, 2, 0, 1, 10).unwrap())
            .expect("duplicate timestamp is not an error");
        assert_eq!(dup, None);
        assert_eq!(store.len(), 1);
    }
}
