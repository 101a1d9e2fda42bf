use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use slob_schemas::{Direction, ExitReason, Session, Trade, TradeResult};
use uuid::Uuid;

#[tokio::test]
async fn session_and_trade_rows_report_together_for_one_trading_day() -> Result<()> {
    let pool = slob_db::testkit_db_pool().await?;

    let date = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
    let mut session = Session::new(date, Utc.timestamp_opt(1_753_500_000, 0).unwrap(), 50_000_000_000);
    slob_db::upsert_session(&pool, &session).await?;

    let setup_id = Uuid::new_v4();
    let trade = Trade {
        id: Uuid::new_v4(),
        setup_id,
        symbol: "NQ".to_string(),
        direction: Direction::Long,
        entry_time: Utc::now(),
        entry_price: 21_500_000_000,
        exit_time: Utc::now(),
        exit_price: 21_550_000_000,
        exit_reason: ExitReason::TakeProfit,
        size: 1,
        pnl_points: 50_000_000,
        pnl_cash_micros: 1_000_000_000,
        result: TradeResult::Win,
    };
    slob_db::insert_trade(&pool, &trade).await?;

    session.trades_taken = 1;
    session.trades_won = 1;
    session.daily_pnl_micros = trade.pnl_cash_micros;
    slob_db::upsert_session(&pool, &session).await?;

    let loaded_session = slob_db::load_session(&pool, date).await?.unwrap();
    assert_eq!(loaded_session.trades_won, 1);
    assert_eq!(loaded_session.daily_pnl_micros, 1_000_000_000);

    let trades = slob_db::load_all_trades(&pool).await?;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].result, TradeResult::Win);
    Ok(())
}
