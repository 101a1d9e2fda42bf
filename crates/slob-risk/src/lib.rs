//! slob-risk
//!
//! Per-trade sizing, drawdown-based size reduction / hard stops, kill-switch
//! gating of new orders, and trailing performance metrics.
//!
//! Deterministic, pure logic. No IO, no time, no broker calls — the
//! `RiskManager` is handed equity/drawdown readings and order requests by
//! the engine loop and returns decisions; persistence of `RiskState` between
//! calls is `slob-db`'s job.

mod engine;
mod metrics;
mod sizing;
mod types;

pub use engine::{evaluate, tick, update_drawdown_state, validate_equity_input, validate_order_qty};
pub use metrics::{metrics, PerformanceMetrics};
pub use sizing::{size, SizeDecision, SizingMethod, TradeOutcomeMicros};
pub use types::*;

/// Convenience wrapper bundling config + state behind the three calls the
/// engine actually needs: `size()` before sending an order, `update()` on
/// every equity reading, `metrics()` on demand for reporting/dashboards.
#[derive(Debug, Clone)]
pub struct RiskManager {
    pub config: RiskConfig,
    pub state: RiskState,
}

impl RiskManager {
    pub fn new(config: RiskConfig, day_id: u32, starting_equity_micros: i64, reject_window_id: u32) -> Self {
        Self {
            state: RiskState::new(day_id, starting_equity_micros, reject_window_id),
            config,
        }
    }

    /// Position size for a new trade; see `sizing::size` for the priority
    /// order (reduced-fractional -> half-Kelly -> ATR-inverse -> normal
    /// fractional). `atr_micros` is the current ATR reading if one is
    /// available; pass `None` to size purely on fixed-fractional risk.
    pub fn size(
        &self,
        stop_distance_micros: i64,
        atr_micros: Option<f64>,
        trade_history: &[TradeOutcomeMicros],
    ) -> SizeDecision {
        size(
            &self.config,
            self.state.current_equity_micros,
            self.state.risk_reduction_active,
            stop_distance_micros,
            atr_micros,
            trade_history,
        )
    }

    /// Rolls a fresh equity reading into drawdown state (peak tracking,
    /// `risk_reduction_active`/`trading_enabled` toggles).
    pub fn update(&mut self, equity_micros: i64) {
        update_drawdown_state(&self.config, &mut self.state, equity_micros);
    }

    /// Gates one order/modify/flatten request against current state.
    pub fn evaluate(&mut self, input: &RiskInput) -> RiskDecision {
        evaluate(&self.config, &mut self.state, input)
    }

    pub fn metrics(&self, returns: &[f64], trade_pnls_micros: &[i64]) -> PerformanceMetrics {
        metrics(returns, trade_pnls_micros)
    }
}
