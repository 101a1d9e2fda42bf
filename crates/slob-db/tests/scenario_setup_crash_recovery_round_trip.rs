// A setup that reaches EntryArmed, crashes, and is rehydrated on restart
// must come back with state and raw fields intact — the role active_setups
// plays for the engine loop's SetupTracker on a cold start.

use anyhow::Result;
use chrono::Utc;
use slob_schemas::{Direction, Setup, SetupState};
use uuid::Uuid;

#[tokio::test]
async fn a_restarted_engine_rehydrates_in_flight_setups() -> Result<()> {
    let pool = slob_db::testkit_db_pool().await?;

    let mut setup = Setup::new(Uuid::new_v4(), "NQ", Direction::Long, 21_500_000_000, 21_400_000_000);
    slob_db::upsert_setup(&pool, &setup, Utc::now()).await?;

    setup.state = SetupState::ConsolidationForming;
    slob_db::upsert_setup(&pool, &setup, Utc::now()).await?;

    let completed_elsewhere = Setup::new(Uuid::new_v4(), "NQ", Direction::Short, 1, 0);
    let mut completed_elsewhere = completed_elsewhere;
    completed_elsewhere.state = SetupState::Completed;
    slob_db::upsert_setup(&pool, &completed_elsewhere, Utc::now()).await?;

    // Simulate a fresh process reconnecting to the same state file.
    let rehydrated = slob_db::load_active_setups(&pool).await?;
    assert_eq!(rehydrated.len(), 1);
    assert_eq!(rehydrated[0].id, setup.id);
    assert_eq!(rehydrated[0].state, SetupState::ConsolidationForming);
    Ok(())
}
