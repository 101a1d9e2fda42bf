//! `active_setups` persistence (§4.15): one row per `Setup`, keyed by its
//! `Uuid`. Queryable columns (`state`, `symbol`, timestamps) exist for index
//! coverage; `raw_data` carries the full JSON so a crash mid-setup loses
//! nothing a restart can't rebuild — same role the reference schema's
//! `raw_data TEXT -- Full JSON for recovery` column plays.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use slob_schemas::Setup;
use sqlx::{Row, SqlitePool};

/// Insert a new setup, or overwrite it in place if `id` already exists.
/// The engine loop calls this on every state transition (§5: "every
/// transition writes a snapshot"), so last-write-wins is correct — there is
/// exactly one writer.
pub async fn upsert_setup(pool: &SqlitePool, setup: &Setup, now: DateTime<Utc>) -> Result<()> {
    let raw = serde_json::to_string(setup).context("serialize setup")?;
    let state = format!("{:?}", setup.state);

    sqlx::query(
        r#"
        insert into active_setups (id, state, symbol, created_at, last_updated, raw_data)
        values (?1, ?2, ?3, ?4, ?4, ?5)
        on conflict(id) do update set
            state        = excluded.state,
            last_updated = excluded.last_updated,
            raw_data     = excluded.raw_data
        "#,
    )
    .bind(setup.id.to_string())
    .bind(&state)
    .bind(&setup.symbol)
    .bind(now.to_rfc3339())
    .bind(&raw)
    .execute(pool)
    .await
    .context("upsert_setup failed")?;

    Ok(())
}

pub async fn load_setup(pool: &SqlitePool, id: uuid::Uuid) -> Result<Option<Setup>> {
    let row = sqlx::query("select raw_data from active_setups where id = ?1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .context("load_setup failed")?;

    let Some(row) = row else { return Ok(None) };
    let raw: String = row.try_get("raw_data")?;
    let setup: Setup = serde_json::from_str(&raw).context("deserialize setup")?;
    Ok(Some(setup))
}

/// All setups not yet in a terminal state, oldest first — the set the
/// engine loop rehydrates into its in-memory `SetupTracker` on restart.
pub async fn load_active_setups(pool: &SqlitePool) -> Result<Vec<Setup>> {
    let rows = sqlx::query(
        r#"
        select raw_data from active_setups
        where state not in ('Completed', 'Invalidated')
        order by created_at asc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("load_active_setups failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: String = row.try_get("raw_data")?;
        out.push(serde_json::from_str(&raw).context("deserialize setup")?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slob_schemas::Direction;
    use uuid::Uuid;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::migrate(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn round_trips_a_setup_through_raw_json() {
        let pool = test_pool().await;
        let setup = Setup::new(Uuid::new_v4(), "NQ", Direction::Long, 100_000_000, 99_000_000);
        upsert_setup(&pool, &setup, Utc::now()).await.unwrap();

        let loaded = load_setup(&pool, setup.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, setup.id);
        assert_eq!(loaded.symbol, "NQ");
    }

    #[tokio::test]
    async fn upsert_on_existing_id_overwrites_rather_than_duplicates() {
        let pool = test_pool().await;
        let mut setup = Setup::new(Uuid::new_v4(), "NQ", Direction::Short, 1, 0);
        upsert_setup(&pool, &setup, Utc::now()).await.unwrap();

        setup.state = slob_schemas::SetupState::Liq1Detected;
        upsert_setup(&pool, &setup, Utc::now()).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("select count(*) from active_setups")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let loaded = load_setup(&pool, setup.id).await.unwrap().unwrap();
        assert_eq!(loaded.state, slob_schemas::SetupState::Liq1Detected);
    }

    #[tokio::test]
    async fn active_setups_excludes_terminal_states() {
        let pool = test_pool().await;
        let mut done = Setup::new(Uuid::new_v4(), "NQ", Direction::Long, 1, 0);
        done.state = slob_schemas::SetupState::Completed;
        upsert_setup(&pool, &done, Utc::now()).await.unwrap();

        let live = Setup::new(Uuid::new_v4(), "NQ", Direction::Long, 1, 0);
        upsert_setup(&pool, &live, Utc::now()).await.unwrap();

        let active = load_active_setups(&pool).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, live.id);
    }
}
