use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One row per trading day, the unit `StatePersistence` snapshots a
/// `RiskManager` against on restart. `date` is the UTC-floored session day
/// (§A.9: UTC is the canonical session-clock boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub starting_capital_micros: i64,
    pub ending_capital_micros: Option<i64>,
    pub trades_taken: u32,
    pub trades_won: u32,
    pub trades_lost: u32,
    pub daily_pnl_micros: i64,
    pub trading_enabled: bool,
    pub risk_reduction_active: bool,
}

impl Session {
    pub fn new(date: NaiveDate, started_at: DateTime<Utc>, starting_capital_micros: i64) -> Self {
        Session {
            date,
            started_at,
            ended_at: None,
            starting_capital_micros,
            ending_capital_micros: None,
            trades_taken: 0,
            trades_won: 0,
            trades_lost: 0,
            daily_pnl_micros: 0,
            trading_enabled: true,
            risk_reduction_active: false,
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades_taken == 0 {
            return 0.0;
        }
        self.trades_won as f64 / self.trades_taken as f64
    }
}
