//! `BacktestConfig::conservative_defaults()` is strictly tighter than
//! `test_defaults()` on every safety knob that affects realism.

use slob_backtest::{BacktestConfig, BacktestEngine, CorporateActionPolicy};

#[test]
fn conservative_defaults_enable_slippage_and_forbid_by_default() {
    let test = BacktestConfig::test_defaults();
    let conservative = BacktestConfig::conservative_defaults();

    assert_eq!(test.stress.slippage_bps, 0, "test defaults are permissive");
    assert!(conservative.stress.slippage_bps > 0);
    assert!(conservative.stress.volatility_mult_bps > 0);

    assert!(matches!(test.corporate_action_policy, CorporateActionPolicy::Allow));
    assert!(matches!(
        conservative.corporate_action_policy,
        CorporateActionPolicy::ForbidPeriods(ref v) if v.is_empty()
    ));
}

#[test]
fn conservative_defaults_run_cleanly_with_no_exclusions() {
    let scale = |p: f64| (p * 1_000_000.0) as i64;
    let bars: Vec<_> = (0..5)
        .map(|i| {
            slob_backtest::BacktestBar::new(
                "NQ",
                i * 60,
                scale(100.0),
                scale(101.0),
                scale(99.0),
                scale(100.0),
                100,
            )
        })
        .collect();

    let engine = BacktestEngine::new(BacktestConfig::conservative_defaults());
    let report = engine.run(&bars).expect("run");
    assert!(!report.halted);
}
