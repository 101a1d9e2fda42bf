use crate::{
    KillSwitchEvent, KillSwitchType, ReasonCode, RequestKind, RiskAction, RiskConfig, RiskDecision,
    RiskInput, RiskState,
};

// ---------------------------------------------------------------------------
// Exposure sanity clamps
// ---------------------------------------------------------------------------

/// Guard: `equity_micros` must be >= 0. Negative equity is unrepresentable;
/// catching it here stops it from corrupting drawdown math downstream.
pub fn validate_equity_input(equity_micros: i64) -> Option<RiskDecision> {
    if equity_micros < 0 {
        return Some(RiskDecision {
            action: RiskAction::Halt,
            reason: ReasonCode::BadInput,
            kill_switch: None,
        });
    }
    None
}

/// Guard: `order_qty` must be strictly positive.
pub fn validate_order_qty(qty: i64) -> Option<RiskDecision> {
    if qty <= 0 {
        return Some(RiskDecision {
            action: RiskAction::Halt,
            reason: ReasonCode::BadInput,
            kill_switch: None,
        });
    }
    None
}

// ---------------------------------------------------------------------------
// Core engine
// ---------------------------------------------------------------------------

/// Deterministic tick maintenance: day/reject-window rollover, peak equity.
pub fn tick(_cfg: &RiskConfig, st: &mut RiskState, inp: &RiskInput) {
    if inp.day_id != st.day_id {
        st.day_id = inp.day_id;
        st.day_start_equity_micros = inp.equity_micros;
    }

    if inp.equity_micros > st.peak_equity_micros {
        st.peak_equity_micros = inp.equity_micros;
    }

    if inp.reject_window_id != st.reject_window_id {
        st.reject_window_id = inp.reject_window_id;
        st.reject_count_in_window = 0;
    }
}

/// Rolls a fresh equity reading into the drawdown toggles: `reduce_size_at_dd`
/// flips `risk_reduction_active` reversibly (it clears again once equity
/// recovers above the line); `max_drawdown_stop` sets `trading_enabled =
/// false` permanently for the run. Call this once per equity update, ahead
/// of `evaluate` for the same input.
pub fn update_drawdown_state(cfg: &RiskConfig, st: &mut RiskState, equity_micros: i64) {
    st.current_equity_micros = equity_micros;
    if equity_micros > st.peak_equity_micros {
        st.peak_equity_micros = equity_micros;
    }

    let dd = st.drawdown_fraction(equity_micros);
    st.risk_reduction_active = dd >= cfg.reduce_size_at_dd;

    if dd >= cfg.max_drawdown_stop {
        st.trading_enabled = false;
    }
}

/// Main evaluator (pure deterministic logic + sticky flags in state).
///
/// Gate order: bad-input clamp -> kill switch (overrides everything) ->
/// sticky halt / disabled trading (flatten still allowed through) -> hard-
/// stop drawdown breach (flatten+halt) -> reject storm -> allow.
pub fn evaluate(cfg: &RiskConfig, st: &mut RiskState, inp: &RiskInput) -> RiskDecision {
    if let Some(_bad) = validate_equity_input(inp.equity_micros) {
        st.halted = true;
        return RiskDecision {
            action: RiskAction::Halt,
            reason: ReasonCode::BadInput,
            kill_switch: None,
        };
    }

    tick(cfg, st, inp);
    update_drawdown_state(cfg, st, inp.equity_micros);

    if let Some(ks) = &inp.kill_switch {
        st.halted = true;

        let action = match ks.kind {
            KillSwitchType::MissingProtectiveStop => {
                if cfg.missing_protective_stop_flattens {
                    RiskAction::FlattenAndHalt
                } else {
                    RiskAction::Halt
                }
            }
            _ => RiskAction::FlattenAndHalt,
        };

        return RiskDecision {
            action,
            reason: ReasonCode::KillSwitchTriggered,
            kill_switch: Some(ks.clone()),
        };
    }

    if st.halted || !st.trading_enabled {
        return match inp.request {
            RequestKind::Flatten => RiskDecision {
                action: RiskAction::Allow,
                reason: ReasonCode::AlreadyHalted,
                kill_switch: None,
            },
            _ if inp.is_risk_reducing => RiskDecision {
                action: RiskAction::Allow,
                reason: ReasonCode::AlreadyHalted,
                kill_switch: None,
            },
            _ => RiskDecision {
                action: RiskAction::Reject,
                reason: ReasonCode::AlreadyHalted,
                kill_switch: None,
            },
        };
    }

    // Hard-stop drawdown: flatten + halt, permanently, once breached.
    if st.drawdown_fraction(inp.equity_micros) >= cfg.max_drawdown_stop {
        st.halted = true;
        st.trading_enabled = false;
        return RiskDecision {
            action: RiskAction::FlattenAndHalt,
            reason: ReasonCode::MaxDrawdownBreached,
            kill_switch: Some(
                KillSwitchEvent::new(KillSwitchType::Manual)
                    .with_evidence("type", "MAX_DRAWDOWN")
                    .with_evidence("peak_equity_micros", st.peak_equity_micros.to_string())
                    .with_evidence("equity_micros", inp.equity_micros.to_string())
                    .with_evidence("max_drawdown_stop", cfg.max_drawdown_stop.to_string()),
            ),
        };
    }

    if matches!(inp.request, RequestKind::NewOrder)
        && st.reject_count_in_window >= cfg.reject_storm_max_rejects_in_window
    {
        st.halted = true;
        return RiskDecision {
            action: RiskAction::Halt,
            reason: ReasonCode::RejectStormBreached,
            kill_switch: Some(
                KillSwitchEvent::new(KillSwitchType::RejectStorm)
                    .with_evidence("reject_window_id", st.reject_window_id.to_string())
                    .with_evidence(
                        "reject_count_in_window",
                        st.reject_count_in_window.to_string(),
                    )
                    .with_evidence(
                        "reject_storm_max_rejects_in_window",
                        cfg.reject_storm_max_rejects_in_window.to_string(),
                    ),
            ),
        };
    }

    RiskDecision {
        action: RiskAction::Allow,
        reason: ReasonCode::Allowed,
        kill_switch: None,
    }
}
