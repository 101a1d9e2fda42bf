//! Command handler modules for slob-cli.
//!
//! Each command group is a thin wrapper over the library crates it drives —
//! argument parsing and reporting only, no business logic of its own.

pub mod backtest;
pub mod md;
pub mod shadow;
pub mod train;

/// Turn a `--db` CLI argument (a bare file path, by far the common case)
/// into a sqlite connection URL `slob_db::connect` accepts. sqlx special-
/// cases `sqlite://<path>` as equivalent to `sqlite:<path>` for relative
/// paths, and as the rooted `sqlite:///<path>` form for absolute ones, so a
/// plain `sqlite://` prefix handles both without the caller worrying about
/// it. A value that already names a scheme is passed through unchanged.
pub fn db_url(path: &str) -> String {
    if path.contains("://") || path == "sqlite::memory:" {
        path.to_string()
    } else {
        format!("sqlite://{path}")
    }
}
