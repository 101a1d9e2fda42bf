//! Same bars + same config => byte-identical report, every run.

use slob_backtest::{BacktestBar, BacktestConfig, BacktestEngine};

fn bar(symbol: &str, i: i64, o: f64, h: f64, l: f64, c: f64, v: i64, day_id: u32) -> BacktestBar {
    let scale = |p: f64| (p * 1_000_000.0) as i64;
    let mut b = BacktestBar::new(symbol, i * 60, scale(o), scale(h), scale(l), scale(c), v);
    b.day_id = day_id;
    b
}

fn session(symbol: &str, day_id: u32) -> Vec<BacktestBar> {
    let mut bars = Vec::new();
    for i in 0..10 {
        bars.push(bar(symbol, i, 100.0, 101.0, 99.0, 100.0, 100, day_id));
    }
    bars.push(bar(symbol, 10, 100.0, 110.0, 99.5, 100.0, 800, day_id));
    for i in 11..16 {
        bars.push(bar(symbol, i, 100.0, 100.5, 99.5, 100.0, 120, day_id));
    }
    bars.push(bar(symbol, 16, 100.0, 105.0, 99.9, 100.1, 900, day_id));
    bars.push(bar(symbol, 17, 100.1, 100.2, 95.0, 95.5, 300, day_id));
    bars.push(bar(symbol, 18, 95.5, 96.0, 94.0, 95.8, 300, day_id));
    bars
}

#[test]
fn ten_runs_over_the_same_bars_agree() {
    let engine = BacktestEngine::new(BacktestConfig::test_defaults());
    let bars = session("NQ", 20250102);

    let first = engine.run(&bars).expect("run 1");
    for n in 2..=10 {
        let rerun = engine.run(&bars).unwrap_or_else(|e| panic!("run {n}: {e}"));
        assert_eq!(rerun, first, "run {n} diverged from run 1");
    }
}

#[test]
fn multi_symbol_multi_session_replay_is_deterministic() {
    let engine = BacktestEngine::new(BacktestConfig::test_defaults());
    let mut bars = session("NQ", 20250102);
    bars.extend(session("ES", 20250102));

    let a = engine.run(&bars).expect("run a");
    let b = engine.run(&bars).expect("run b");
    assert_eq!(a, b);
    assert!(a.last_prices.contains_key("NQ"));
    assert!(a.last_prices.contains_key("ES"));
}
