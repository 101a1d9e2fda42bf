//! `session_state` persistence (§4.15): one row per trading day, the unit
//! `StatePersistence` snapshots a `RiskManager`/session against on restart.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use slob_schemas::Session;
use sqlx::{Row, SqlitePool};

pub async fn upsert_session(pool: &SqlitePool, session: &Session) -> Result<()> {
    sqlx::query(
        r#"
        insert into session_state (
          date, started_at, ended_at, starting_capital_micros, ending_capital_micros,
          trades_taken, trades_won, trades_lost, daily_pnl_micros,
          trading_enabled, risk_reduction_active
        ) values (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
        on conflict(date) do update set
          ended_at                = excluded.ended_at,
          ending_capital_micros   = excluded.ending_capital_micros,
          trades_taken            = excluded.trades_taken,
          trades_won              = excluded.trades_won,
          trades_lost             = excluded.trades_lost,
          daily_pnl_micros        = excluded.daily_pnl_micros,
          trading_enabled         = excluded.trading_enabled,
          risk_reduction_active   = excluded.risk_reduction_active
        "#,
    )
    .bind(session.date.to_string())
    .bind(session.started_at.to_rfc3339())
    .bind(session.ended_at.map(|t| t.to_rfc3339()))
    .bind(session.starting_capital_micros)
    .bind(session.ending_capital_micros)
    .bind(session.trades_taken)
    .bind(session.trades_won)
    .bind(session.trades_lost)
    .bind(session.daily_pnl_micros)
    .bind(session.trading_enabled)
    .bind(session.risk_reduction_active)
    .execute(pool)
    .await
    .context("upsert_session failed")?;

    Ok(())
}

pub async fn load_session(pool: &SqlitePool, date: NaiveDate) -> Result<Option<Session>> {
    let row = sqlx::query("select * from session_state where date = ?1")
        .bind(date.to_string())
        .fetch_optional(pool)
        .await
        .context("load_session failed")?;

    let Some(row) = row else { return Ok(None) };

    let ended_at: Option<String> = row.try_get("ended_at")?;
    let started_at: String = row.try_get("started_at")?;

    Ok(Some(Session {
        date,
        started_at: chrono::DateTime::parse_from_rfc3339(&started_at)?.with_timezone(&chrono::Utc),
        ended_at: ended_at
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|t| t.with_timezone(&chrono::Utc)))
            .transpose()?,
        starting_capital_micros: row.try_get("starting_capital_micros")?,
        ending_capital_micros: row.try_get("ending_capital_micros")?,
        trades_taken: row.try_get::<i64, _>("trades_taken")? as u32,
        trades_won: row.try_get::<i64, _>("trades_won")? as u32,
        trades_lost: row.try_get::<i64, _>("trades_lost")? as u32,
        daily_pnl_micros: row.try_get("daily_pnl_micros")?,
        trading_enabled: row.try_get("trading_enabled")?,
        risk_reduction_active: row.try_get("risk_reduction_active")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::migrate(&pool).await.unwrap();
        pool
    }

    fn sample_session() -> Session {
        Session::new(
            NaiveDate::from_ymd_opt(2026, 7, 26).unwrap(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            50_000_000_000,
        )
    }

    #[tokio::test]
    async fn round_trips_a_fresh_session() {
        let pool = test_pool().await;
        let session = sample_session();
        upsert_session(&pool, &session).await.unwrap();

        let loaded = load_session(&pool, session.date).await.unwrap().unwrap();
        assert_eq!(loaded.starting_capital_micros, 50_000_000_000);
        assert!(loaded.trading_enabled);
    }

    #[tokio::test]
    async fn upsert_overwrites_the_same_day_instead_of_duplicating() {
        let pool = test_pool().await;
        let mut session = sample_session();
        upsert_session(&pool, &session).await.unwrap();

        session.trades_taken = 3;
        session.trades_won = 2;
        session.daily_pnl_micros = 5_000_000;
        upsert_session(&pool, &session).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("select count(*) from session_state")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let loaded = load_session(&pool, session.date).await.unwrap().unwrap();
        assert_eq!(loaded.trades_taken, 3);
        assert_eq!(loaded.daily_pnl_micros, 5_000_000);
    }

    #[tokio::test]
    async fn missing_day_loads_as_none() {
        let pool = test_pool().await;
        let loaded = load_session(&pool, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .await
            .unwrap();
        assert!(loaded.is_none());
    }
}
