//! Backtest Engine (Event-Sourced Replay) — spec.md §4.16.
//!
//! Pipeline: BAR -> PATTERN FINDER -> SETUP STATE MACHINE -> FILL SIM
//!
//! - Deterministic replay (same bars + config => identical results).
//! - No lookahead (incomplete bars rejected).
//! - Fills are simulated per §4.16: scan forward from `entry_idx` until
//!   the bar's low <= tp (SHORT) or >= tp (LONG) — TP fill — or the bar's
//!   high/low crosses sl — SL fill, taking precedence over TP in the same
//!   bar — or `max_hold_bars` elapses, yielding a TIMEOUT exit at the last
//!   scanned bar's close.
//! - Same `PatternFinder` + `SetupStateMachine`/`SetupTracker` logic the
//!   live engine uses, fed from a historical `BarStore` instead of a live
//!   feed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use slob_execution::{SetupEvent, SetupStateMachine, SetupTracker, SetupTransitionError, Side};
use slob_patterns::PatternFinder;
use slob_schemas::{Bar, BarError, BarStore, Direction};

use crate::types::{BacktestBar, BacktestConfig, BacktestReport, Fill, StressProfile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BacktestError {
    /// A bar was marked incomplete (anti-lookahead).
    IncompleteBar { symbol: String, end_ts: i64 },
    /// Negative timestamp is invalid.
    NegativeTimestamp { end_ts: i64 },
    /// A bar's OHLC quadruple failed validation.
    InvalidBar { symbol: String, end_ts: i64, reason: BarError },
    /// Both `slippage_bps` and `volatility_mult_bps` must be >= 0. A
    /// negative value inverts the fill-price adjustment (BUY fills
    /// cheaper, SELL fills higher), which is a look-ahead / overfitting
    /// artifact and is unconditionally rejected.
    NegativeSlippage { field: &'static str, value_bps: i64 },
    /// The setup state machine rejected a transition the engine itself
    /// drives — an internal invariant violation, never a data problem.
    Internal(String),
}

impl std::fmt::Display for BacktestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BacktestError::IncompleteBar { symbol, end_ts } => {
                write!(f, "incomplete bar: {} @ ts={}", symbol, end_ts)
            }
            BacktestError::NegativeTimestamp { end_ts } => {
                write!(f, "negative timestamp: {}", end_ts)
            }
            BacktestError::InvalidBar { symbol, end_ts, reason } => {
                write!(f, "invalid bar: {} @ ts={}: {}", symbol, end_ts, reason)
            }
            BacktestError::NegativeSlippage { field, value_bps } => write!(
                f,
                "negative slippage rejected: {} = {} bps (must be >= 0)",
                field, value_bps
            ),
            BacktestError::Internal(msg) => write!(f, "internal backtest error: {}", msg),
        }
    }
}

impl std::error::Error for BacktestError {}

impl From<SetupTransitionError> for BacktestError {
    fn from(e: SetupTransitionError) -> Self {
        BacktestError::Internal(format!("{e}"))
    }
}

enum ExitReason {
    TakeProfit,
    StopLoss,
    Timeout,
}

/// The backtest engine: deterministic single-pass replay of historical bars.
pub struct BacktestEngine {
    config: BacktestConfig,
    finder: PatternFinder,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            finder: PatternFinder::default(),
        }
    }

    pub fn with_finder(config: BacktestConfig, finder: PatternFinder) -> Self {
        Self { config, finder }
    }

    pub fn run(&self, bars: &[BacktestBar]) -> Result<BacktestReport, BacktestError> {
        if self.config.stress.slippage_bps < 0 {
            return Err(BacktestError::NegativeSlippage {
                field: "slippage_bps",
                value_bps: self.config.stress.slippage_bps,
            });
        }
        if self.config.stress.volatility_mult_bps < 0 {
            return Err(BacktestError::NegativeSlippage {
                field: "volatility_mult_bps",
                value_bps: self.config.stress.volatility_mult_bps,
            });
        }

        let mut report = BacktestReport {
            halted: false,
            halt_reason: None,
            equity_curve: Vec::new(),
            fills: Vec::new(),
            last_prices: BTreeMap::new(),
            execution_blocked: false,
        };

        let mut equity_micros = self.config.initial_cash_micros;
        if let Some(first) = bars.first() {
            report.equity_curve.push((first.end_ts, equity_micros));
        }

        // Validate every bar up front (anti-lookahead + corporate-action
        // gate) before grouping, so a bad bar halts deterministically
        // regardless of which symbol/session it belongs to.
        for bar in bars {
            if !bar.is_complete {
                return Err(BacktestError::IncompleteBar {
                    symbol: bar.symbol.clone(),
                    end_ts: bar.end_ts,
                });
            }
            if bar.end_ts < 0 {
                return Err(BacktestError::NegativeTimestamp { end_ts: bar.end_ts });
            }
            if self
                .config
                .corporate_action_policy
                .is_excluded(&bar.symbol, bar.end_ts)
            {
                report.halted = true;
                report.execution_blocked = true;
                report.halt_reason = Some(format!(
                    "corporate action exclusion: {} @ ts={}",
                    bar.symbol, bar.end_ts
                ));
                return Ok(report);
            }
        }

        // Group by symbol (stable: input is sorted end_ts ASC then symbol
        // ASC, so each per-symbol subsequence stays end_ts ASC), then by
        // session day within the symbol.
        let mut by_symbol: BTreeMap<&str, Vec<&BacktestBar>> = BTreeMap::new();
        for bar in bars {
            by_symbol.entry(bar.symbol.as_str()).or_default().push(bar);
        }

        for (symbol, symbol_bars) in by_symbol {
            let mut sessions: Vec<(u32, Vec<&BacktestBar>)> = Vec::new();
            for bar in symbol_bars {
                match sessions.last_mut() {
                    Some((day, bucket)) if *day == bar.day_id => bucket.push(bar),
                    _ => sessions.push((bar.day_id, vec![bar])),
                }
            }

            for (day_id, session_bars) in sessions {
                if let Some(last) = session_bars.last() {
                    report
                        .last_prices
                        .insert(symbol.to_string(), last.close_micros);
                }

                let mut store = BarStore::new(symbol);
                for b in &session_bars {
                    let bar = Bar::new(
                        chrono::DateTime::from_timestamp(b.end_ts, 0).unwrap_or_default(),
                        b.open_micros,
                        b.high_micros,
                        b.low_micros,
                        b.close_micros,
                        b.volume,
                    )
                    .map_err(|reason| BacktestError::InvalidBar {
                        symbol: symbol.to_string(),
                        end_ts: b.end_ts,
                        reason,
                    })?;
                    store
                        .push(bar)
                        .map_err(|e| BacktestError::Internal(e.to_string()))?;
                }

                let session_slice = store.as_slice();
                let setup = match self.finder.scan_session(symbol, session_slice) {
                    Ok(setup) => setup,
                    Err(_reason) => continue,
                };

                let mut tracker = SetupTracker::new();
                let session_date = day_id_to_date(day_id);
                let id = tracker.spawn(setup, session_date);
                let sm = tracker.get_mut(id).expect("just spawned");
                drive_to_order_submitted(sm)?;

                let entry = sm.setup().entry.expect("scan_session always sets entry");
                let sl = sm.setup().sl_price.expect("scan_session always sets sl_price");
                let tp = sm.setup().tp_price.expect("scan_session always sets tp_price");
                let direction = sm.setup().direction;

                sm.apply(SetupEvent::Filled)?;

                let (exit_idx, exit_price, _reason) = simulate_exit(
                    session_slice,
                    entry.idx,
                    direction,
                    sl,
                    tp,
                    self.config.max_hold_bars,
                );

                sm.apply(SetupEvent::Completed)?;
                let finished = tracker.evict_terminal();
                debug_assert_eq!(finished.len(), 1);

                let entry_side = Side::entry_side(direction);
                let exit_side = Side::exit_side(direction);
                let qty = position_size(&self.config, equity_micros, entry.price, sl);

                if qty > 0 {
                    let entry_bar = &session_slice[entry.idx];
                    let exit_bar = &session_slice[exit_idx];

                    let entry_fill_price =
                        apply_slippage(entry.price, entry_side, entry_bar, &self.config.stress);
                    let exit_fill_price =
                        apply_slippage(exit_price, exit_side, exit_bar, &self.config.stress);

                    report.fills.push(Fill {
                        symbol: symbol.to_string(),
                        side: entry_side,
                        qty,
                        price_micros: entry_fill_price,
                        fee_micros: 0,
                    });
                    report.fills.push(Fill {
                        symbol: symbol.to_string(),
                        side: exit_side,
                        qty,
                        price_micros: exit_fill_price,
                        fee_micros: 0,
                    });

                    let pnl_micros = match direction {
                        Direction::Long => (exit_fill_price - entry_fill_price) * qty,
                        Direction::Short => (entry_fill_price - exit_fill_price) * qty,
                    };
                    equity_micros += pnl_micros;
                    report
                        .equity_curve
                        .push((exit_bar.ts_close_utc.timestamp(), equity_micros));
                }
            }
        }

        Ok(report)
    }
}

fn drive_to_order_submitted(sm: &mut SetupStateMachine) -> Result<(), SetupTransitionError> {
    sm.apply(SetupEvent::Liq1Detected)?;
    sm.apply(SetupEvent::ConsolidationExtended)?;
    sm.apply(SetupEvent::ConsolidationConfirmed)?;
    sm.apply(SetupEvent::NoWickSweepFound)?;
    sm.apply(SetupEvent::EntryArmed)?;
    sm.apply(SetupEvent::OrderSubmitted)
}

/// Scans forward from `entry_idx` per §4.16: SL takes precedence over TP
/// within the same bar; timeout yields the last scanned bar's close.
fn simulate_exit(
    bars: &[Bar],
    entry_idx: usize,
    direction: Direction,
    sl: i64,
    tp: i64,
    max_hold_bars: usize,
) -> (usize, i64, ExitReason) {
    let start = entry_idx + 1;
    let end = (entry_idx + 1 + max_hold_bars).min(bars.len());

    for idx in start..end {
        let bar = &bars[idx];
        let sl_hit = match direction {
            Direction::Long => bar.low <= sl,
            Direction::Short => bar.high >= sl,
        };
        if sl_hit {
            return (idx, sl, ExitReason::StopLoss);
        }
        let tp_hit = match direction {
            Direction::Long => bar.high >= tp,
            Direction::Short => bar.low <= tp,
        };
        if tp_hit {
            return (idx, tp, ExitReason::TakeProfit);
        }
    }

    let last_idx = end.saturating_sub(1).max(entry_idx);
    (last_idx, bars[last_idx].close, ExitReason::Timeout)
}

fn position_size(config: &BacktestConfig, equity_micros: i64, entry: i64, sl: i64) -> i64 {
    let stop_distance = (entry - sl).abs();
    let decision = slob_risk::size(&config.risk_config, equity_micros, false, stop_distance, None, &[]);
    decision.quantity as i64
}

fn apply_slippage(price: i64, side: Side, bar: &Bar, stress: &StressProfile) -> i64 {
    if stress.slippage_bps == 0 && stress.volatility_mult_bps == 0 {
        return price;
    }
    let bar_spread_bps = if bar.close != 0 {
        (bar.range() * 10_000) / bar.close
    } else {
        0
    };
    let vol_component = (bar_spread_bps * stress.volatility_mult_bps) / 10_000;
    let bps = stress.slippage_bps + vol_component;
    let adj = (price * bps) / 10_000;
    match side {
        Side::Buy => price + adj,
        Side::Sell => price - adj,
    }
}

fn day_id_to_date(day_id: u32) -> NaiveDate {
    let year = (day_id / 10_000) as i32;
    let month = (day_id / 100) % 100;
    let day = day_id % 100;
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
}
