//! Trading-day identity for a UTC bar timestamp, matching the `day_id`
//! convention `slob-backtest::BacktestBar` uses (`YYYYMMDD` as a `u32`).

use chrono::{DateTime, Datelike, Utc};

pub fn day_id(ts: DateTime<Utc>) -> u32 {
    let d = ts.date_naive();
    d.year() as u32 * 10_000 + d.month() * 100 + d.day()
}
