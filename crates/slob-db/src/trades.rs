//! `trades` persistence (§4.15): one row per setup that reached
//! `SetupState::Completed`, referencing its `active_setups.id`.

use anyhow::{Context, Result};
use slob_schemas::{Direction, ExitReason, Trade, TradeResult};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

fn direction_str(d: Direction) -> &'static str {
    match d {
        Direction::Long => "LONG",
        Direction::Short => "SHORT",
    }
}

fn parse_direction(s: &str) -> Result<Direction> {
    match s {
        "LONG" => Ok(Direction::Long),
        "SHORT" => Ok(Direction::Short),
        other => Err(anyhow::anyhow!("invalid direction: {other}")),
    }
}

fn exit_reason_str(r: ExitReason) -> &'static str {
    match r {
        ExitReason::StopLoss => "SL",
        ExitReason::TakeProfit => "TP",
        ExitReason::ManualClose => "MANUAL",
        ExitReason::EndOfDay => "EOD",
    }
}

fn parse_exit_reason(s: &str) -> Result<ExitReason> {
    match s {
        "SL" => Ok(ExitReason::StopLoss),
        "TP" => Ok(ExitReason::TakeProfit),
        "MANUAL" => Ok(ExitReason::ManualClose),
        "EOD" => Ok(ExitReason::EndOfDay),
        other => Err(anyhow::anyhow!("invalid exit_reason: {other}")),
    }
}

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
        other => Err(anyhow::anyhow!("invalid result: {other}")),
    }
}

/// Insert a closed trade. Idempotent on `id` — replaying the same
/// `Trade::id` after a crash-recovery re-apply is a no-op, not a duplicate.
pub async fn insert_trade(pool: &SqlitePool, trade: &Trade) -> Result<()> {
    sqlx::query(
        r#"
        insert into trades (
          id, setup_id, symbol, direction,
          entry_time, entry_price, exit_time, exit_price, exit_reason,
          size, pnl_points, pnl_cash_micros, result
        ) values (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)
        on conflict(id) do nothing
        "#,
    )
    .bind(trade.id.to_string())
    .bind(trade.setup_id.to_string())
    .bind(&trade.symbol)
    .bind(direction_str(trade.direction))
    .bind(trade.entry_time.to_rfc3339())
    .bind(trade.entry_price)
    .bind(trade.exit_time.to_rfc3339())
    .bind(trade.exit_price)
    .bind(exit_reason_str(trade.exit_reason))
    .bind(trade.size)
    .bind(trade.pnl_points)
    .bind(trade.pnl_cash_micros)
    .bind(result_str(trade.result))
    .execute(pool)
    .await
    .context("insert_trade failed")?;

    Ok(())
}

fn row_to_trade(row: &sqlx::sqlite::SqliteRow) -> Result<Trade> {
    Ok(Trade {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
        setup_id: Uuid::parse_str(&row.try_get::<String, _>("setup_id")?)?,
        symbol: row.try_get("symbol")?,
        direction: parse_direction(&row.try_get::<String, _>("direction")?)?,
        entry_time: chrono::DateTime::parse_from_rfc3339(&row.try_get::<String, _>("entry_time")?)?
            .with_timezone(&chrono::Utc),
        entry_price: row.try_get("entry_price")?,
        exit_time: chrono::DateTime::parse_from_rfc3339(&row.try_get::<String, _>("exit_time")?)?
            .with_timezone(&chrono::Utc),
        exit_price: row.try_get("exit_price")?,
        exit_reason: parse_exit_reason(&row.try_get::<String, _>("exit_reason")?)?,
        size: row.try_get("size")?,
        pnl_points: row.try_get("pnl_points")?,
        pnl_cash_micros: row.try_get("pnl_cash_micros")?,
        result: parse_result(&row.try_get::<String, _>("result")?)?,
    })
}

pub async fn load_trades_for_setup(pool: &SqlitePool, setup_id: Uuid) -> Result<Vec<Trade>> {
    let rows = sqlx::query(
        r#"
        select * from trades where setup_id = ?1 order by entry_time asc
        "#,
    )
    .bind(setup_id.to_string())
    .fetch_all(pool)
    .await
    .context("load_trades_for_setup failed")?;

    rows.iter().map(row_to_trade).collect()
}

/// All trades ordered by entry time; the input `RiskManager::metrics()` and
/// the backtest report consume.
pub async fn load_all_trades(pool: &SqlitePool) -> Result<Vec<Trade>> {
    let rows = sqlx::query("select * from trades order by entry_time asc")
        .fetch_all(pool)
        .await
        .context("load_all_trades failed")?;

    rows.iter().map(row_to_trade).collect()
}
