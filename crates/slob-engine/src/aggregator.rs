//! Tick -> bar aggregation (§4.13): successive ticks of the same minute are
//! aggregated into a `Bar` emitted on minute close. Per-symbol, so multiple
//! instruments can be streamed through one aggregator.

use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};

use slob_schemas::{Bar, BarError};

use crate::types::Tick;

#[derive(Clone, Debug)]
struct Bucket {
    minute: DateTime<Utc>,
    open: i64,
    high: i64,
    low: i64,
    close: i64,
    volume: i64,
}

impl Bucket {
    fn open_with(minute: DateTime<Utc>, price: i64, size: i64) -> Self {
        Self { minute, open: price, high: price, low: price, close: price, volume: size }
    }

    fn extend(&mut self, price: i64, size: i64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += size;
    }

    /// The bar's close timestamp is the minute boundary the bucket closed
    /// at (one minute past `minute`), matching the historical loader's
    /// end-of-bar convention `slob-backtest` consumes.
    fn close(&self) -> Result<Bar, BarError> {
        let ts_close = self.minute + chrono::Duration::minutes(1);
        Bar::new(ts_close, self.open, self.high, self.low, self.close, self.volume)
    }
}

fn minute_floor(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(ts)
}

/// Aggregates a live tick stream into closed, one-minute `Bar`s per symbol.
#[derive(Default)]
pub struct BarAggregator {
    open: HashMap<String, Bucket>,
    /// Last minute closed per symbol, so a late tick for an already-closed
    /// minute is dropped instead of reopening it (§5 ordering guarantee).
    last_closed_minute: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    InvalidBar(BarError),
}

impl std::fmt::Display for AggregatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregatorError::InvalidBar(e) => write!(f, "aggregated bar rejected: {e}"),
        }
    }
}

impl std::error::Error for AggregatorError {}

impl BarAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one tick in. Returns `Some(bar)` if the tick's minute rolls
    /// the previous bucket for this symbol closed; `None` while the
    /// current minute is still accumulating. Ticks whose minute is at or
    /// before the last-closed minute for the symbol are dropped silently —
    /// they arrived out of order and the bar they'd belong to has already
    /// been emitted.
    pub fn push(&mut self, tick: Tick) -> Result<Option<Bar>, AggregatorError> {
        let minute = minute_floor(tick.timestamp);

        if let Some(last_closed) = self.last_closed_minute.get(&tick.symbol) {
            if minute <= *last_closed {
                return Ok(None);
            }
        }

        match self.open.get_mut(&tick.symbol) {
            None => {
                self.open.insert(tick.symbol, Bucket::open_with(minute, tick.price_micros, tick.size));
                Ok(None)
            }
            Some(bucket) if bucket.minute == minute => {
                bucket.extend(tick.price_micros, tick.size);
                Ok(None)
            }
            Some(_) => {
                let finished = self.open.remove(&tick.symbol).expect("just matched Some(_)");
                let closed_minute = finished.minute;
                let bar = finished.close().map_err(AggregatorError::InvalidBar)?;
                self.last_closed_minute.insert(tick.symbol.clone(), closed_minute);
                self.open.insert(tick.symbol, Bucket::open_with(minute, tick.price_micros, tick.size));
                Ok(Some(bar))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tick(symbol: &str, secs_into_minute: u32, minute: u32, price: f64) -> Tick {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 9, minute, secs_into_minute).unwrap();
        Tick { symbol: symbol.to_string(), price_micros: (price * 1_000_000.0) as i64, size: 1, timestamp: ts }
    }

    #[test]
    fn ticks_in_the_same_minute_accumulate_without_emitting() {
        let mut agg = BarAggregator::new();
        assert_eq!(agg.push(tick("NQ", 0, 0, 100.0)).unwrap(), None);
        assert_eq!(agg.push(tick("NQ", 30, 0, 101.0)).unwrap(), None);
    }

    #[test]
    fn a_tick_in_the_next_minute_closes_the_previous_bucket() {
        let mut agg = BarAggregator::new();
        agg.push(tick("NQ", 0, 0, 100.0)).unwrap();
        agg.push(tick("NQ", 30, 0, 102.0)).unwrap();
        agg.push(tick("NQ", 5, 0, 99.0)).unwrap();

        let bar = agg.push(tick("NQ", 0, 1, 105.0)).unwrap().expect("minute 0 closes");
        assert_eq!(bar.open, 100_000_000);
        assert_eq!(bar.high, 102_000_000);
        assert_eq!(bar.low, 99_000_000);
        assert_eq!(bar.close, 99_000_000);
        assert_eq!(bar.volume, 3);
    }

    #[test]
    fn a_late_tick_for_an_already_closed_minute_is_dropped() {
        let mut agg = BarAggregator::new();
        agg.push(tick("NQ", 0, 0, 100.0)).unwrap();
        agg.push(tick("NQ", 0, 1, 101.0)).unwrap(); // closes minute 0
        // Late arrival for minute 0: dropped, no panic, no re-open.
        let result = agg.push(tick("NQ", 59, 0, 999.0)).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn symbols_aggregate_independently() {
        let mut agg = BarAggregator::new();
        agg.push(tick("NQ", 0, 0, 100.0)).unwrap();
        agg.push(tick("ES", 0, 0, 4500.0)).unwrap();
        let nq_bar = agg.push(tick("NQ", 0, 1, 101.0)).unwrap();
        assert!(nq_bar.is_some());
        // ES minute 0 is still open; no bar yet.
        assert_eq!(agg.push(tick("ES", 30, 0, 4501.0)).unwrap(), None);
    }
}
