//! Performance metrics over a trailing equity curve / trade log: Sharpe,
//! Sortino, Calmar, max drawdown (+ duration), win rate, profit factor.
//! Pure functions over `&[f64]`/`&[i64]` — no engine state, no IO.

use statrs::statistics::Statistics;

const TRADING_PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerformanceMetrics {
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown_fraction: f64,
    pub max_drawdown_duration_bars: u32,
    pub win_rate: f64,
    pub profit_factor: f64,
}

/// `returns` are per-period fractional returns (e.g. daily P&L / equity at
/// period start); `trade_pnls_micros` are individual closed-trade results
/// used for win rate and profit factor. Both may be empty; metrics that
/// can't be computed from an empty series are reported as 0.0.
pub fn metrics(returns: &[f64], trade_pnls_micros: &[i64]) -> PerformanceMetrics {
    let sharpe = sharpe_ratio(returns);
    let sortino = sortino_ratio(returns);
    let (max_dd, max_dd_duration) = max_drawdown(returns);
    let calmar = calmar_ratio(returns, max_dd);
    let win_rate = win_rate(trade_pnls_micros);
    let profit_factor = profit_factor(trade_pnls_micros);

    PerformanceMetrics {
        sharpe,
        sortino,
        calmar,
        max_drawdown_fraction: max_dd,
        max_drawdown_duration_bars: max_dd_duration,
        win_rate,
        profit_factor,
    }
}

fn annualized_mean(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.to_vec().mean() * TRADING_PERIODS_PER_YEAR
}

fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = returns.to_vec().std_dev();
    if std <= 1e-12 {
        return 0.0;
    }
    annualized_mean(returns) / (std * TRADING_PERIODS_PER_YEAR.sqrt())
}

fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_dev = downside.to_vec().std_dev();
    if downside_dev <= 1e-12 {
        return 0.0;
    }
    annualized_mean(returns) / (downside_dev * TRADING_PERIODS_PER_YEAR.sqrt())
}

fn calmar_ratio(returns: &[f64], max_dd: f64) -> f64 {
    if max_dd <= 1e-12 {
        return 0.0;
    }
    annualized_mean(returns) / max_dd
}

/// Returns `(max_drawdown_fraction, duration_in_bars)` from a per-period
/// return series, tracked via a running equity curve starting at 1.0.
fn max_drawdown(returns: &[f64]) -> (f64, u32) {
    if returns.is_empty() {
        return (0.0, 0);
    }

    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut peak_idx = 0usize;

    let mut worst_dd = 0.0_f64;
    let mut worst_duration = 0u32;

    for (i, r) in returns.iter().enumerate() {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
            peak_idx = i;
        }
        let dd = if peak > 0.0 { (peak - equity) / peak } else { 0.0 };
        if dd > worst_dd {
            worst_dd = dd;
            worst_duration = (i - peak_idx) as u32;
        }
    }

    (worst_dd, worst_duration)
}

fn win_rate(trade_pnls_micros: &[i64]) -> f64 {
    if trade_pnls_micros.is_empty() {
        return 0.0;
    }
    let wins = trade_pnls_micros.iter().filter(|p| **p > 0).count();
    wins as f64 / trade_pnls_micros.len() as f64
}

fn profit_factor(trade_pnls_micros: &[i64]) -> f64 {
    let gross_profit: i64 = trade_pnls_micros.iter().filter(|p| **p > 0).sum();
    let gross_loss: i64 = trade_pnls_micros.iter().filter(|p| **p < 0).map(|p| p.abs()).sum();
    if gross_loss == 0 {
        return if gross_profit > 0 { f64::INFINITY } else { 0.0 };
    }
    gross_profit as f64 / gross_loss as f64
}
