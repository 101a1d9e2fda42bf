//! Backtest command handlers.
//!
//! `BacktestEngine` is self-contained (pattern finder + setup state machine
//! run internally against the bars it's given) — there is no pluggable
//! strategy to wire in, only bars in and a report out.

use anyhow::{Context, Result};
use std::path::Path;

use slob_backtest::{BacktestBar, BacktestConfig, BacktestEngine};

pub async fn run_backtest_csv(bars_path: String, out_dir: Option<String>) -> Result<()> {
    let bars = slob_backtest::load_csv_file(&bars_path)
        .with_context(|| format!("load bars csv failed: {}", bars_path))?;

    let cfg = BacktestConfig::conservative_defaults();
    let initial_cash_micros = cfg.initial_cash_micros;
    let engine = BacktestEngine::new(cfg);
    let report = engine.run(&bars).context("backtest run failed")?;

    report_result("csv", bars.len(), &report, initial_cash_micros, out_dir.as_deref())
}

pub async fn run_backtest_db(db_path: String, symbols: String, timeframe: String, out_dir: Option<String>) -> Result<()> {
    let syms: Vec<String> = symbols
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();
    if syms.is_empty() {
        anyhow::bail!("--symbols must contain at least one symbol");
    }

    let pool = slob_db::connect(&crate::commands::db_url(&db_path)).await?;

    let mut bars: Vec<BacktestBar> = Vec::new();
    for symbol in &syms {
        let rows = slob_db::bars::fetch_bars(&pool, symbol, &timeframe)
            .await
            .with_context(|| format!("fetch_bars failed for {symbol}"))?;
        for r in rows {
            let day_id = epoch_secs_to_yyyymmdd(r.end_ts);
            let reject_window_id = r.end_ts.div_euclid(60).try_into().unwrap_or(u32::MAX);
            bars.push(BacktestBar {
                symbol: r.symbol,
                end_ts: r.end_ts,
                open_micros: r.open_micros,
                high_micros: r.high_micros,
                low_micros: r.low_micros,
                close_micros: r.close_micros,
                volume: r.volume,
                is_complete: r.is_complete,
                day_id,
                reject_window_id,
            });
        }
    }
    bars.sort_by_key(|b| (b.symbol.clone(), b.end_ts));

    let cfg = BacktestConfig::conservative_defaults();
    let initial_cash_micros = cfg.initial_cash_micros;
    let engine = BacktestEngine::new(cfg);
    let report = engine.run(&bars).context("backtest run failed")?;

    report_result("db", bars.len(), &report, initial_cash_micros, out_dir.as_deref())
}

fn report_result(
    source: &str,
    bars_loaded: usize,
    report: &slob_backtest::BacktestReport,
    initial_cash_micros: i64,
    out_dir: Option<&str>,
) -> Result<()> {
    if let Some(dir) = out_dir {
        slob_artifacts::write_backtest_report(Path::new(dir), report)
            .with_context(|| format!("write backtest artifacts failed: {}", dir))?;
        println!("artifacts_written=true out_dir={}", dir);
    } else {
        println!("artifacts_written=false");
    }

    let final_equity = report
        .equity_curve
        .last()
        .map(|(_, eq)| *eq)
        .unwrap_or(initial_cash_micros);

    println!("backtest_ok=true");
    println!("source={}", source);
    println!("bars_loaded={}", bars_loaded);
    println!("fills={}", report.fills.len());
    println!("execution_blocked={}", report.execution_blocked);
    println!("halted={}", report.halted);
    if let Some(r) = &report.halt_reason {
        println!("halt_reason={}", r);
    }
    println!("final_equity_micros={}", final_equity);

    Ok(())
}

/// Howard Hinnant's civil-from-days algorithm — same math the teacher's CLI
/// used to derive `day_id` for DB-sourced bars that don't carry one.
fn epoch_secs_to_yyyymmdd(epoch_secs: i64) -> u32 {
    let days = epoch_secs.div_euclid(86_400);
    let (y, m, d) = civil_from_days(days);
    let y = y as i64;
    let m = m as i64;
    let d = d as i64;
    (y * 10_000 + m * 100 + d).try_into().unwrap_or(19700101)
}

fn civil_from_days(days_since_epoch: i64) -> (i32, u32, u32) {
    let z = days_since_epoch + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 }.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096).div_euclid(365);
    let y = (yoe as i32) + (era as i32) * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2).div_euclid(153);
    let d = (doy - (153 * mp + 2).div_euclid(5) + 1) as u32;
    let m = (mp + if mp < 10 { 3 } else { -9 }) as u32;
    let year = y + if m <= 2 { 1 } else { 0 };
    (year, m, d)
}
