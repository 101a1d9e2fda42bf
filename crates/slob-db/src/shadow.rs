//! `shadow_predictions` persistence (§4.15): one row per setup that reached
//! `EntryArmed`, recording the ML gate's and the rule pipeline's decisions so
//! the offline shadow-mode analyzer can measure agreement without the ML
//! decision ever risking capital.

use anyhow::{Context, Result};
use slob_schemas::{ShadowPrediction, TradeResult};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

fn result_str(r: TradeResult) -> &'static str {
    match r {
        TradeResult::Win => "WIN",
        TradeResult::Loss => "LOSS",
        TradeResult::Breakeven => "BREAKEVEN",
    }
}

fn parse_result(s: &str) -> Result<TradeResult> {
    match s {
        "WIN" => Ok(TradeResult::Win),
        "LOSS" => Ok(TradeResult::Loss),
        "BREAKEVEN" => Ok(TradeResult::Breakeven),
        other => Err(anyhow::anyhow!("invalid actual_outcome: {other}")),
    }
}

pub async fn insert_shadow_prediction(pool: &SqlitePool, sp: &ShadowPrediction) -> Result<()> {
    sqlx::query(
        r#"
        insert into shadow_predictions (
          id, setup_id, created_at, ml_probability, ml_decision, rule_decision,
          agreement, actual_outcome, actual_pnl_micros
        ) values (?1,?2,?3,?4,?5,?6,?7,?8,?9)
        on conflict(id) do nothing
        "#,
    )
    .bind(sp.id.to_string())
    .bind(sp.setup_id.to_string())
    .bind(sp.created_at.to_rfc3339())
    .bind(sp.ml_probability)
    .bind(sp.ml_decision)
    .bind(sp.rule_decision)
    .bind(sp.agreement())
    .bind(sp.actual_outcome.map(result_str))
    .bind(sp.actual_pnl_micros)
    .execute(pool)
    .await
    .context("insert_shadow_prediction failed")?;

    Ok(())
}

/// Stamp a prediction with its realized outcome once the linked trade
/// closes. A prediction's actual outcome is unknowable at write time.
pub async fn mark_shadow_outcome(
    pool: &SqlitePool,
    id: Uuid,
    outcome: TradeResult,
    pnl_micros: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        update shadow_predictions
        set actual_outcome = ?2, actual_pnl_micros = ?3
        where id = ?1
        "#,
    )
    .bind(id.to_string())
    .bind(result_str(outcome))
    .bind(pnl_micros)
    .execute(pool)
    .await
    .context("mark_shadow_outcome failed")?;

    Ok(())
}

pub async fn load_shadow_predictions(pool: &SqlitePool) -> Result<Vec<ShadowPrediction>> {
    let rows = sqlx::query("select * from shadow_predictions order by created_at asc")
        .fetch_all(pool)
        .await
        .context("load_shadow_predictions failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let actual_outcome: Option<String> = row.try_get("actual_outcome")?;
        out.push(ShadowPrediction {
            id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
            setup_id: Uuid::parse_str(&row.try_get::<String, _>("setup_id")?)?,
            created_at: chrono::DateTime::parse_from_rfc3339(&row.try_get::<String, _>("created_at")?)?
                .with_timezone(&chrono::Utc),
            ml_probability: row.try_get("ml_probability")?,
            ml_decision: row.try_get("ml_decision")?,
            rule_decision: row.try_get("rule_decision")?,
            actual_outcome: actual_outcome.map(|s| parse_result(&s)).transpose()?,
            actual_pnl_micros: row.try_get("actual_pnl_micros")?,
        });
    }
    Ok(out)
}
