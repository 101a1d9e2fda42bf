use assert_cmd::prelude::*;
use predicates::prelude::*;

/// `slob db migrate` then `slob db status` against a fresh SQLite file must
/// report the schema as present.
#[test]
fn db_migrate_then_status_reports_schema_present() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("cli_test.sqlite3");
    let db_str = db_path.to_string_lossy().to_string();

    let mut migrate = assert_cmd::Command::cargo_bin("slob-cli")?;
    migrate.args(["db", "migrate", "--db", &db_str]);
    migrate.assert().success().stdout(predicate::str::contains("migrations_applied=true"));

    let mut status = assert_cmd::Command::cargo_bin("slob-cli")?;
    status.args(["db", "status", "--db", &db_str]);
    status
        .assert()
        .success()
        .stdout(predicate::str::contains("db_ok=true"))
        .stdout(predicate::str::contains("has_active_setups_table=true"));

    Ok(())
}
