use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::prices::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ManualClose,
    EndOfDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeResult {
    Win,
    Loss,
    Breakeven,
}

impl TradeResult {
    pub fn from_pnl_micros(pnl_micros: i64) -> Self {
        if pnl_micros > 0 {
            TradeResult::Win
        } else if pnl_micros < 0 {
            TradeResult::Loss
        } else {
            TradeResult::Breakeven
        }
    }
}

/// A closed position, one row per `active_setups.id` that reached
/// `SetupState::Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub setup_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub entry_price: i64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: i64,
    pub exit_reason: ExitReason,
    pub size: i64,
    pub pnl_points: i64,
    pub pnl_cash_micros: i64,
    pub result: TradeResult,
}
