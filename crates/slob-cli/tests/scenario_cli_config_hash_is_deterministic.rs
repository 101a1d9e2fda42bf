use assert_cmd::prelude::*;
use std::io::Write;

/// `slob config-hash` over the same layered YAML inputs must print the same
/// hash on every invocation — the hash is a reproducibility fingerprint, not
/// wall-clock-dependent.
#[test]
fn config_hash_is_stable_across_invocations() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base_path = dir.path().join("base.yaml");
    let mut base = std::fs::File::create(&base_path)?;
    writeln!(base, "risk:\n  max_drawdown_pct: 0.1\nengine:\n  id: MAIN\n")?;
    drop(base);

    let overlay_path = dir.path().join("overlay.yaml");
    let mut overlay = std::fs::File::create(&overlay_path)?;
    writeln!(overlay, "risk:\n  max_drawdown_pct: 0.2\n")?;
    drop(overlay);

    let run_once = || -> anyhow::Result<String> {
        let mut cmd = assert_cmd::Command::cargo_bin("slob-cli")?;
        cmd.args([
            "config-hash",
            &base_path.to_string_lossy(),
            &overlay_path.to_string_lossy(),
        ]);
        let out = cmd.output()?;
        assert!(out.status.success());
        Ok(String::from_utf8(out.stdout)?)
    };

    let first = run_once()?;
    let second = run_once()?;
    assert_eq!(first, second);

    let hash_line = first
        .lines()
        .find(|l| l.starts_with("config_hash="))
        .expect("config_hash line present");
    assert!(hash_line.len() > "config_hash=".len());

    Ok(())
}
