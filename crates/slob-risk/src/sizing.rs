//! Position sizing: fixed-fractional by default, optionally switched to
//! half-Kelly once enough trade history exists. `sizing` never looks at
//! live orders or broker state — it's a pure function of account equity,
//! current volatility (ATR), and (optionally) trailing trade history.

use crate::types::{
    RiskConfig, KELLY_FRACTION_CAP, KELLY_MIN_TRADE_HISTORY,
};

/// One closed trade's result in account-currency micros, used only for the
/// Kelly win-rate/payoff-ratio estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TradeOutcomeMicros(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizingMethod {
    FixedFractional,
    FixedFractionalReduced,
    HalfKelly,
    AtrInverse,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SizeDecision {
    pub method: SizingMethod,
    pub risk_budget_micros: i64,
    pub quantity: u32,
}

/// Computes the position size for a new trade.
///
/// Priority order (matches spec's `[RiskManager].size()` contract):
/// 1. If `risk_reduction_active`, use the reduced fixed-fractional percent.
/// 2. Else if Kelly is enabled and at least `KELLY_MIN_TRADE_HISTORY` trades
///    exist, use half-Kelly (capped at `KELLY_FRACTION_CAP` of equity).
/// 3. Else if `atr_micros` was supplied, size inversely to current
///    volatility: `contracts = risk_budget / atr`. A zero, NaN, or infinite
///    ATR reading (or a resulting non-finite/non-positive contract count)
///    falls back to a single contract rather than sizing blind.
/// 4. Else use the normal fixed-fractional percent.
///
/// `stop_distance_micros` is the per-contract risk (entry to stop, in
/// price-micros); quantity is the risk budget divided by that distance,
/// floored to a whole contract, never negative.
pub fn size(
    cfg: &RiskConfig,
    equity_micros: i64,
    risk_reduction_active: bool,
    stop_distance_micros: i64,
    atr_micros: Option<f64>,
    trade_history: &[TradeOutcomeMicros],
) -> SizeDecision {
    if stop_distance_micros <= 0 || equity_micros <= 0 {
        return SizeDecision {
            method: SizingMethod::FixedFractional,
            risk_budget_micros: 0,
            quantity: 0,
        };
    }

    if risk_reduction_active {
        let risk_budget_micros = (equity_micros as f64 * reduced_pct(cfg)) as i64;
        let quantity = (risk_budget_micros / stop_distance_micros).max(0) as u32;
        return SizeDecision {
            method: SizingMethod::FixedFractionalReduced,
            risk_budget_micros,
            quantity,
        };
    }

    if cfg.use_kelly && trade_history.len() >= KELLY_MIN_TRADE_HISTORY {
        let kelly_pct = half_kelly_fraction(trade_history).min(cfg.kelly_fraction.min(KELLY_FRACTION_CAP));
        let risk_budget_micros = (equity_micros as f64 * kelly_pct) as i64;
        let quantity = (risk_budget_micros / stop_distance_micros).max(0) as u32;
        return SizeDecision {
            method: SizingMethod::HalfKelly,
            risk_budget_micros,
            quantity,
        };
    }

    let risk_budget_micros = (equity_micros as f64 * cfg.per_trade_pct) as i64;

    if let Some(atr) = atr_micros {
        let quantity = atr_inverse_quantity(risk_budget_micros, atr);
        return SizeDecision {
            method: SizingMethod::AtrInverse,
            risk_budget_micros,
            quantity,
        };
    }

    let quantity = (risk_budget_micros / stop_distance_micros).max(0) as u32;
    SizeDecision {
        method: SizingMethod::FixedFractional,
        risk_budget_micros,
        quantity,
    }
}

/// `contracts = risk_budget / atr`, falling back to a single contract
/// whenever the ATR reading or the resulting count isn't a usable positive
/// number — an unsized position is worse than an oversized one.
fn atr_inverse_quantity(risk_budget_micros: i64, atr_micros: f64) -> u32 {
    if atr_micros == 0.0 || atr_micros.is_nan() || atr_micros.is_infinite() {
        return 1;
    }
    let contracts = risk_budget_micros as f64 / atr_micros;
    if contracts.is_nan() || contracts.is_infinite() || contracts <= 0.0 {
        return 1;
    }
    contracts as u32
}

fn reduced_pct(cfg: &RiskConfig) -> f64 {
    // Half of the configured per-trade percent, floored at the spec's
    // documented 1% reduced-size rate.
    (cfg.per_trade_pct / 2.0).min(crate::types::FIXED_FRACTIONAL_REDUCED_PCT)
}

/// Half-Kelly fraction from trailing trade outcomes: `f* = W - (1-W)/R`
/// where `W` is win rate and `R` is the average-win/average-loss ratio.
/// Returns 0 if there's no loss history to compute a payoff ratio from, or
/// if the full-Kelly fraction would be negative (no edge).
fn half_kelly_fraction(trades: &[TradeOutcomeMicros]) -> f64 {
    let wins: Vec<f64> = trades.iter().filter(|t| t.0 > 0).map(|t| t.0 as f64).collect();
    let losses: Vec<f64> = trades.iter().filter(|t| t.0 < 0).map(|t| t.0.unsigned_abs() as f64).collect();

    if trades.is_empty() || losses.is_empty() || wins.is_empty() {
        return 0.0;
    }

    let win_rate = wins.len() as f64 / trades.len() as f64;
    let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
    let avg_loss = losses.iter().sum::<f64>() / losses.len() as f64;
    let payoff_ratio = avg_win / avg_loss;

    let full_kelly = win_rate - (1.0 - win_rate) / payoff_ratio;
    (full_kelly / 2.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_stop_distance_yields_zero_quantity() {
        let cfg = RiskConfig::sane_defaults();
        let d = size(&cfg, 100_000 * 1_000_000, false, 0, None, &[]);
        assert_eq!(d.quantity, 0);
    }

    #[test]
    fn normal_mode_uses_fixed_fractional() {
        let cfg = RiskConfig::sane_defaults();
        let equity = 100_000 * 1_000_000_i64;
        let d = size(&cfg, equity, false, 500_000, None, &[]);
        assert_eq!(d.method, SizingMethod::FixedFractional);
        assert_eq!(d.risk_budget_micros, (equity as f64 * 0.02) as i64);
        assert_eq!(d.quantity, (d.risk_budget_micros / 500_000) as u32);
    }

    #[test]
    fn risk_reduction_halves_the_budget_and_uses_reduced_method() {
        let cfg = RiskConfig::sane_defaults();
        let equity = 100_000 * 1_000_000_i64;
        let d = size(&cfg, equity, true, 500_000, None, &[]);
        assert_eq!(d.method, SizingMethod::FixedFractionalReduced);
        assert!(d.risk_budget_micros < (equity as f64 * 0.02) as i64);
    }

    #[test]
    fn kelly_requires_minimum_trade_history() {
        let mut cfg = RiskConfig::sane_defaults();
        cfg.use_kelly = true;
        let equity = 100_000 * 1_000_000_i64;
        let history: Vec<TradeOutcomeMicros> = (0..5)
            .map(|i| TradeOutcomeMicros(if i % 2 == 0 { 1_000_000 } else { -500_000 }))
            .collect();
        let d = size(&cfg, equity, false, 500_000, None, &history);
        assert_eq!(d.method, SizingMethod::FixedFractional);
    }

    #[test]
    fn kelly_engages_once_history_is_long_enough() {
        let mut cfg = RiskConfig::sane_defaults();
        cfg.use_kelly = true;
        let equity = 100_000 * 1_000_000_i64;
        let history: Vec<TradeOutcomeMicros> = (0..20)
            .map(|i| TradeOutcomeMicros(if i % 2 == 0 { 2_000_000 } else { -1_000_000 }))
            .collect();
        let d = size(&cfg, equity, false, 500_000, None, &history);
        assert_eq!(d.method, SizingMethod::HalfKelly);
        assert!(d.risk_budget_micros > 0);
    }

    #[test]
    fn kelly_never_exceeds_its_cap() {
        let mut cfg = RiskConfig::sane_defaults();
        cfg.use_kelly = true;
        cfg.kelly_fraction = 0.5;
        let equity = 100_000 * 1_000_000_i64;
        // All wins, no losses -> half_kelly_fraction returns 0 (no payoff
        // ratio can be computed), so this also exercises that guard.
        let history: Vec<TradeOutcomeMicros> = (0..20).map(|_| TradeOutcomeMicros(1_000_000)).collect();
        let d = size(&cfg, equity, false, 500_000, None, &history);
        assert_eq!(d.risk_budget_micros, 0);
    }

    #[test]
    fn atr_supplied_sizes_inversely_to_volatility() {
        let cfg = RiskConfig::sane_defaults();
        let equity = 100_000 * 1_000_000_i64;
        let d = size(&cfg, equity, false, 500_000, Some(1_000_000.0), &[]);
        assert_eq!(d.method, SizingMethod::AtrInverse);
        let expected_budget = (equity as f64 * 0.02) as i64;
        assert_eq!(d.risk_budget_micros, expected_budget);
        assert_eq!(d.quantity, (expected_budget as f64 / 1_000_000.0) as u32);
    }

    #[test]
    fn atr_inverse_falls_back_to_one_contract_on_degenerate_atr() {
        let cfg = RiskConfig::sane_defaults();
        let equity = 100_000 * 1_000_000_i64;
        for degenerate in [0.0, f64::NAN, f64::INFINITY] {
            let d = size(&cfg, equity, false, 500_000, Some(degenerate), &[]);
            assert_eq!(d.method, SizingMethod::AtrInverse);
            assert_eq!(d.quantity, 1);
        }
    }

    #[test]
    fn kelly_takes_priority_over_atr_when_both_apply() {
        let mut cfg = RiskConfig::sane_defaults();
        cfg.use_kelly = true;
        let equity = 100_000 * 1_000_000_i64;
        let history: Vec<TradeOutcomeMicros> = (0..20)
            .map(|i| TradeOutcomeMicros(if i % 2 == 0 { 2_000_000 } else { -1_000_000 }))
            .collect();
        let d = size(&cfg, equity, false, 500_000, Some(1_000_000.0), &history);
        assert_eq!(d.method, SizingMethod::HalfKelly);
    }
}
