use slob_risk::*;

const M: i64 = 1_000_000;

#[test]
fn scenario_forced_flatten_and_halt_on_hard_stop_drawdown_breach() {
    let mut cfg = RiskConfig::sane_defaults();
    cfg.max_drawdown_stop = 0.20;

    // Start the day at 100k, peak tracks the same.
    let mut st = RiskState::new(20260216, 100_000 * M, 1);

    // Equity drops 21% from peak => breach => FlattenAndHalt, permanently.
    let inp = RiskInput {
        day_id: 20260216,
        equity_micros: 79_000 * M,
        reject_window_id: 1,
        request: RequestKind::NewOrder,
        is_risk_reducing: false,
        kill_switch: None,
    };

    let d = evaluate(&cfg, &mut st, &inp);
    assert_eq!(d.action, RiskAction::FlattenAndHalt);
    assert_eq!(d.reason, ReasonCode::MaxDrawdownBreached);
    assert!(st.halted);
    assert!(!st.trading_enabled);

    // Recovering equity afterward does not lift the permanent stop.
    let recovered = RiskInput {
        day_id: 20260216,
        equity_micros: 100_000 * M,
        reject_window_id: 1,
        request: RequestKind::NewOrder,
        is_risk_reducing: false,
        kill_switch: None,
    };
    let d2 = evaluate(&cfg, &mut st, &recovered);
    assert_eq!(d2.action, RiskAction::Reject);
}
