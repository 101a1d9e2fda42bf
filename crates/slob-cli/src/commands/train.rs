//! `slob train export-features`: builds a labeled feature-vector dataset
//! from persisted trades/setups, for consumption by an offline trainer.
//!
//! The ML *training* loop itself (cross-validation, scipy skew fitting) is
//! out of scope here — `slob-classifier` only loads a fitted `ModelArtifact`,
//! it does not produce one. This command's entire job is turning closed
//! trades into the same 37-column feature vector the live classifier
//! consumes, plus the realized win/loss label, so that fitting can happen
//! externally.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use slob_schemas::{Bar, TradeResult};
use std::path::Path;

pub async fn export_features(db_path: String, out_path: String, timeframe: String) -> Result<()> {
    let pool = slob_db::connect(&crate::commands::db_url(&db_path)).await?;
    let trades = slob_db::load_all_trades(&pool).await.context("load_all_trades failed")?;

    let engineer = slob_features::FeatureEngineer::default();
    let mut written = 0usize;
    let mut skipped = 0usize;

    let mut wtr = csv::Writer::from_path(Path::new(&out_path))
        .with_context(|| format!("open output csv failed: {}", out_path))?;

    let mut header: Vec<String> = slob_features::FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    header.extend(
        ["label", "pnl_cash_micros", "setup_id", "trade_id", "symbol"]
            .iter()
            .map(|s| s.to_string()),
    );
    wtr.write_record(&header)?;

    for trade in &trades {
        let Some(setup) = slob_db::load_setup(&pool, trade.setup_id).await? else {
            skipped += 1;
            continue;
        };
        let Some(trigger) = setup.entry_trigger else {
            skipped += 1;
            continue;
        };

        let rows = slob_db::bars::fetch_bars(&pool, &trade.symbol, &timeframe)
            .await
            .with_context(|| format!("fetch_bars failed for {}", trade.symbol))?;

        let mut bars: Vec<Bar> = Vec::with_capacity(rows.len());
        let mut malformed = false;
        for r in &rows {
            let ts = DateTime::<Utc>::from_timestamp(r.end_ts, 0).unwrap_or(trigger.time);
            match Bar::new(ts, r.open_micros, r.high_micros, r.low_micros, r.close_micros, r.volume) {
                Ok(b) => bars.push(b),
                Err(_) => {
                    malformed = true;
                    break;
                }
            }
        }
        if malformed {
            skipped += 1;
            continue;
        }

        let Some(entry_idx) = bars.iter().position(|b| b.ts_close_utc == trigger.time) else {
            skipped += 1;
            continue;
        };
        let entry_date = bars[entry_idx].ts_close_utc.date_naive();
        let session_start_idx = bars
            .iter()
            .position(|b| b.ts_close_utc.date_naive() == entry_date)
            .unwrap_or(0);

        let features = match engineer.compute(&bars, session_start_idx, &setup) {
            Ok(f) => f,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        let values = serde_json::to_value(&features).context("serialize features failed")?;
        let mut record: Vec<String> = slob_features::FEATURE_NAMES
            .iter()
            .map(|name| values.get(name).map(|v| v.to_string()).unwrap_or_default())
            .collect();

        let label = matches!(trade.result, TradeResult::Win) as u8;
        record.push(label.to_string());
        record.push(trade.pnl_cash_micros.to_string());
        record.push(setup.id.to_string());
        record.push(trade.id.to_string());
        record.push(trade.symbol.clone());

        wtr.write_record(&record)?;
        written += 1;
    }

    wtr.flush()?;

    println!("export_ok=true");
    println!("rows_written={}", written);
    println!("rows_skipped={}", skipped);
    println!("out_path={}", out_path);

    Ok(())
}
