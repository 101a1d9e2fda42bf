use std::collections::BTreeMap;

use slob_execution::Side;
use slob_risk::RiskConfig;

use crate::corporate_actions::CorporateActionPolicy;

/// Stress profile for conservative fill pricing. Out of scope for the
/// backtest fidelity contract in spec.md §4.16 ("slippage ... out of scope
/// ... implementations may add as optional extensions") — applied only
/// when the caller opts in by setting a non-zero field.
///
/// Effective slippage per fill:
/// ```text
/// bar_spread_bps         = (high - low) * 10_000 / close   (volatility proxy)
/// vol_component          = bar_spread_bps * volatility_mult_bps / 10_000
/// effective_slippage_bps = slippage_bps + vol_component
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StressProfile {
    /// Flat slippage floor in basis points (1 bps = 0.01%). 0 = disabled.
    pub slippage_bps: i64,
    /// Fraction of the bar's price spread added as extra slippage, in bps.
    /// `10_000` = 100% of the spread; `0` = disabled.
    pub volatility_mult_bps: i64,
}

impl StressProfile {
    pub fn none() -> Self {
        Self {
            slippage_bps: 0,
            volatility_mult_bps: 0,
        }
    }
}

/// Backtest configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestConfig {
    /// Starting account equity in micros.
    pub initial_cash_micros: i64,
    /// Bars to scan forward from `entry_idx` before a setup times out
    /// un-exited (§4.16's bounded timeout).
    pub max_hold_bars: usize,
    /// Position sizing parameters, reused from `slob-risk` so backtest
    /// contract counts are calibrated the same way live sizing is.
    pub risk_config: RiskConfig,
    /// Conservative fill-pricing slippage. Zeroed fields disable it.
    pub stress: StressProfile,
    /// Corporate action policy (§B4 in the teacher; carried forward since
    /// nothing in the spec narrows it).
    pub corporate_action_policy: CorporateActionPolicy,
}

impl BacktestConfig {
    /// Reasonable defaults for unit tests: no slippage, permissive
    /// corporate-action policy.
    pub fn test_defaults() -> Self {
        Self {
            initial_cash_micros: 100_000_000_000, // 100k USD
            max_hold_bars: 120,
            risk_config: RiskConfig::sane_defaults(),
            stress: StressProfile::none(),
            corporate_action_policy: CorporateActionPolicy::Allow,
        }
    }

    /// Conservative defaults for real evaluation: non-zero slippage floor
    /// and an explicit (initially empty) corporate-action exclusion list,
    /// so a caller must declare exclusions rather than silently allow all.
    pub fn conservative_defaults() -> Self {
        Self {
            initial_cash_micros: 100_000_000_000,
            max_hold_bars: 120,
            risk_config: RiskConfig::sane_defaults(),
            stress: StressProfile {
                slippage_bps: 5,
                volatility_mult_bps: 5_000,
            },
            corporate_action_policy: CorporateActionPolicy::ForbidPeriods(vec![]),
        }
    }
}

/// A single bar in the backtest input sequence, as loaded from CSV.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktestBar {
    pub symbol: String,
    /// Bar end timestamp (epoch seconds).
    pub end_ts: i64,
    pub open_micros: i64,
    pub high_micros: i64,
    pub low_micros: i64,
    pub close_micros: i64,
    pub volume: i64,
    /// If false, the bar is incomplete and must be rejected.
    pub is_complete: bool,
    /// Deterministic trading day identifier (e.g. YYYYMMDD) — sessions are
    /// grouped by this field.
    pub day_id: u32,
    /// Deterministic reject window identifier (e.g. minute bucket).
    pub reject_window_id: u32,
}

impl BacktestBar {
    pub fn new(
        symbol: impl Into<String>,
        end_ts: i64,
        open_micros: i64,
        high_micros: i64,
        low_micros: i64,
        close_micros: i64,
        volume: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            end_ts,
            open_micros,
            high_micros,
            low_micros,
            close_micros,
            volume,
            is_complete: true,
            day_id: 20250101,
            reject_window_id: 0,
        }
    }
}

/// One simulated fill (entry or exit leg of a trade).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub price_micros: i64,
    pub fee_micros: i64,
}

/// Backtest report produced after a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktestReport {
    /// Whether the backtest halted early.
    pub halted: bool,
    /// Reason for halt (if any).
    pub halt_reason: Option<String>,
    /// Equity curve: (end_ts, equity_micros) pairs.
    pub equity_curve: Vec<(i64, i64)>,
    /// All fills executed during the backtest.
    pub fills: Vec<Fill>,
    /// Last known close price per symbol.
    pub last_prices: BTreeMap<String, i64>,
    /// Whether execution was blocked before the run completed (e.g. a
    /// corporate-action exclusion halt).
    pub execution_blocked: bool,
}
