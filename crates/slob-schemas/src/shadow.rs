use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trade::TradeResult;

/// One row per setup that reached `EntryArmed`, recording what the ML gate
/// and the pure rule pipeline each decided, independent of whether the
/// order was actually placed. Used offline by the shadow-mode analyzer to
/// measure ML/rule agreement without risking capital on the ML decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowPrediction {
    pub id: Uuid,
    pub setup_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub ml_probability: f64,
    pub ml_decision: bool,
    pub rule_decision: bool,
    pub actual_outcome: Option<TradeResult>,
    pub actual_pnl_micros: Option<i64>,
}

impl ShadowPrediction {
    pub fn agreement(&self) -> bool {
        self.ml_decision == self.rule_decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_true_when_decisions_match() {
        let sp = ShadowPrediction {
            id: Uuid::nil(),
            setup_id: Uuid::nil(),
            created_at: Utc::now(),
            ml_probability: 0.7,
            ml_decision: true,
            rule_decision: true,
            actual_outcome: None,
            actual_pnl_micros: None,
        };
        assert!(sp.agreement());
    }

    #[test]
    fn agreement_false_when_decisions_differ() {
        let sp = ShadowPrediction {
            id: Uuid::nil(),
            setup_id: Uuid::nil(),
            created_at: Utc::now(),
            ml_probability: 0.3,
            ml_decision: false,
            rule_decision: true,
            actual_outcome: None,
            actual_pnl_micros: None,
        };
        assert!(!sp.agreement());
    }
}
