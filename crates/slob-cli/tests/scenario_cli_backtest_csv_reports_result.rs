use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;

/// `slob backtest csv` against a minimal bars fixture must run to
/// completion and print a result summary, without requiring a DB or any
/// strategy wiring (the engine is self-contained).
#[test]
fn backtest_csv_runs_and_reports_result() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bars_path = dir.path().join("bars.csv");
    let mut f = std::fs::File::create(&bars_path)?;
    writeln!(f, "symbol,end_ts,open_micros,high_micros,low_micros,close_micros,volume")?;
    for i in 0..10i64 {
        let ts = i * 60;
        let px = 1_000_000_000 + i * 1000;
        writeln!(f, "ES,{ts},{px},{},{},{px},100", px + 500, px - 500)?;
    }
    drop(f);

    let mut cmd = assert_cmd::Command::cargo_bin("slob-cli")?;
    cmd.args(["backtest", "csv", "--bars", &bars_path.to_string_lossy()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("backtest_ok=true"))
        .stdout(predicate::str::contains("source=csv"))
        .stdout(predicate::str::contains("bars_loaded=10"));

    Ok(())
}
