//! Deterministic bar fixtures: a synthetic sequence generator and a CSV
//! loader matching the micros-integer `slob_schemas::Bar` shape used
//! everywhere else in the workspace.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use slob_schemas::Bar;

/// Builds `count` consecutive bars starting at `start`, `step_secs` apart,
/// each closing `step_micros` above the last close. Strictly increasing by
/// construction — the shape most scenario tests need without caring about
/// the actual price path.
pub fn synthetic_bar_sequence(
    start: DateTime<Utc>,
    count: usize,
    step_secs: i64,
    start_price_micros: i64,
    step_micros: i64,
) -> Result<Vec<Bar>> {
    let mut bars = Vec::with_capacity(count);
    let mut open = start_price_micros;
    for i in 0..count {
        let ts = start + Duration::seconds(step_secs * i as i64);
        let close = open + step_micros;
        let high = open.max(close) + 1;
        let low = open.min(close) - 1;
        bars.push(Bar::new(ts, open, high, low, close, 100).context("synthetic bar construction failed")?);
        open = close;
    }
    Ok(bars)
}

/// Loads bars from a CSV with columns
/// `ts_close_utc,open_micros,high_micros,low_micros,close_micros,volume`.
pub fn load_bars_csv(path: &str) -> Result<Vec<Bar>> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("open bars csv: {path}"))?;
    let mut out = Vec::new();

    for rec in rdr.records() {
        let rec = rec?;
        let ts: DateTime<Utc> = rec[0].parse().context("parse ts_close_utc")?;
        let open: i64 = rec[1].parse().context("parse open_micros")?;
        let high: i64 = rec[2].parse().context("parse high_micros")?;
        let low: i64 = rec[3].parse().context("parse low_micros")?;
        let close: i64 = rec[4].parse().context("parse close_micros")?;
        let volume: i64 = rec[5].parse().context("parse volume")?;
        out.push(Bar::new(ts, open, high, low, close, volume).context("bar row failed validation")?);
    }

    for w in out.windows(2) {
        if !(w[0].ts_close_utc < w[1].ts_close_utc) {
            anyhow::bail!("bars not strictly increasing");
        }
    }

    Ok(out)
}
