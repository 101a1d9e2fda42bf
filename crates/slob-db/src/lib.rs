//! slob-db
//!
//! Embedded relational persistence (§4.15 `StatePersistence`): a single
//! SQLite file, not a network database server — the engine loop is the
//! only writer (§5), so there is no dispatcher/claim-token machinery here,
//! just WAL-mode durability and idempotent upserts keyed by the natural id
//! of whatever's being persisted (setup id, trade id, session date).
//!
//! Tables: `active_setups`, `trades`, `session_state`, `shadow_predictions`,
//! `audit_events`, `bars` (+ `bar_quality_reports`). Schema versioning is
//! handled by sqlx's own embedded-migration ledger.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

pub mod bars;
pub mod session;
pub mod setups;
pub mod shadow;
pub mod trades;

pub use bars::{
    fetch_bars, ingest_csv_to_bars, ingest_provider_bars_to_bars, price_to_micros, ohlc_sane,
    BarQualityReport, BarRow, CoverageTotals, GroupStats, IngestCsvArgs, IngestProviderBarsArgs,
    IngestResult, ProviderBar,
};
pub use session::{load_session, upsert_session};
pub use setups::{load_active_setups, load_setup, upsert_setup};
pub use shadow::{insert_shadow_prediction, load_shadow_predictions, mark_shadow_outcome};
pub use trades::{insert_trade, load_all_trades, load_trades_for_setup};

pub const ENV_DB_URL: &str = "SLOB_DATABASE_URL";

/// Connect to the state file named by `SLOB_DATABASE_URL` (e.g.
/// `sqlite:///var/lib/slob/state.db` or `sqlite::memory:` for tests),
/// creating it if absent, with WAL mode for crash-safe concurrent reads
/// while the engine loop holds the writer.
pub async fn connect_from_env() -> Result<SqlitePool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid sqlite url: {url}"))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .context("failed to open sqlite state file")?;

    Ok(pool)
}

/// Test helper: an in-memory database with migrations already applied.
pub async fn testkit_db_pool() -> Result<SqlitePool> {
    let pool = connect("sqlite::memory:").await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Run embedded, idempotent, numbered migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_active_setups_table: bool,
}

/// Connectivity + schema-presence check, used by the daemon's status
/// surface and by the CLI's `migrate` subcommand to report current state.
pub async fn status(pool: &SqlitePool) -> Result<DbStatus> {
    let (one,): (i64,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists(
            select 1 from sqlite_master where type = 'table' and name = 'active_setups'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_active_setups_table: exists,
    })
}

/// One row written to the raw `audit_events` table. `slob-audit` layers
/// hash-chain computation and verification on top of this storage
/// primitive — `hash_prev`/`hash_self` are opaque strings here.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub event_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub topic: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub hash_prev: Option<String>,
    pub hash_self: String,
}

/// Append-only insert (no update/delete path exists for this table).
pub async fn insert_audit_event(pool: &SqlitePool, ev: &NewAuditEvent) -> Result<()> {
    sqlx::query(
        r#"
        insert into audit_events (event_id, ts_utc, topic, event_type, payload, hash_prev, hash_self)
        values (?1,?2,?3,?4,?5,?6,?7)
        "#,
    )
    .bind(ev.event_id.to_string())
    .bind(ev.ts_utc.to_rfc3339())
    .bind(&ev.topic)
    .bind(&ev.event_type)
    .bind(serde_json::to_string(&ev.payload).context("serialize audit payload")?)
    .bind(&ev.hash_prev)
    .bind(&ev.hash_self)
    .execute(pool)
    .await
    .context("insert_audit_event failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct AuditEventRow {
    pub event_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub topic: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub hash_prev: Option<String>,
    pub hash_self: String,
}

/// The full chain in write order — `slob-audit`'s verification pass walks
/// this Vec checking each row's `hash_prev` against the previous row's
/// `hash_self`.
pub async fn load_audit_chain(pool: &SqlitePool) -> Result<Vec<AuditEventRow>> {
    let rows = sqlx::query("select * from audit_events order by ts_utc asc, event_id asc")
        .fetch_all(pool)
        .await
        .context("load_audit_chain failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let payload_raw: String = row.try_get("payload")?;
        out.push(AuditEventRow {
            event_id: Uuid::parse_str(&row.try_get::<String, _>("event_id")?)?,
            ts_utc: DateTime::parse_from_rfc3339(&row.try_get::<String, _>("ts_utc")?)?
                .with_timezone(&Utc),
            topic: row.try_get("topic")?,
            event_type: row.try_get("event_type")?,
            payload: serde_json::from_str(&payload_raw).context("deserialize audit payload")?,
            hash_prev: row.try_get("hash_prev")?,
            hash_self: row.try_get("hash_self")?,
        });
    }
    Ok(out)
}
