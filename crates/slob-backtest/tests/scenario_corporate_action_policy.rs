//! Corporate-action exclusion halts the backtest before any fill is
//! simulated, rather than silently processing a contaminated bar.

use slob_backtest::{BacktestBar, BacktestConfig, BacktestEngine, CorporateActionPolicy, ForbidEntry};

fn bar(symbol: &str, i: i64, o: f64, h: f64, l: f64, c: f64, v: i64) -> BacktestBar {
    let scale = |p: f64| (p * 1_000_000.0) as i64;
    BacktestBar::new(symbol, i * 60, scale(o), scale(h), scale(l), scale(c), v)
}

fn bars(symbol: &str) -> Vec<BacktestBar> {
    (0..5)
        .map(|i| bar(symbol, i, 100.0, 101.0, 99.0, 100.0, 100))
        .collect()
}

#[test]
fn allow_policy_processes_every_bar() {
    let mut config = BacktestConfig::test_defaults();
    config.corporate_action_policy = CorporateActionPolicy::Allow;
    let engine = BacktestEngine::new(config);

    let report = engine.run(&bars("NQ")).expect("run");
    assert!(!report.halted);
    assert!(!report.execution_blocked);
}

#[test]
fn forbidden_period_halts_with_blocked_execution() {
    let mut config = BacktestConfig::test_defaults();
    config.corporate_action_policy =
        CorporateActionPolicy::ForbidPeriods(vec![ForbidEntry::new("NQ", 0, 10_000)]);
    let engine = BacktestEngine::new(config);

    let report = engine.run(&bars("NQ")).expect("run");
    assert!(report.halted);
    assert!(report.execution_blocked);
    assert!(report.halt_reason.is_some());
    assert!(report.fills.is_empty());
}

#[test]
fn forbidden_period_for_a_different_symbol_does_not_halt() {
    let mut config = BacktestConfig::test_defaults();
    config.corporate_action_policy =
        CorporateActionPolicy::ForbidPeriods(vec![ForbidEntry::new("ES", 0, 10_000)]);
    let engine = BacktestEngine::new(config);

    let report = engine.run(&bars("NQ")).expect("run");
    assert!(!report.halted);
}
