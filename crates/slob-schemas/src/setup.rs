use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consolidation::Consolidation;
use crate::prices::Direction;

/// Lifecycle of a single setup, as driven by `SetupStateMachine`. Transitions
/// are one-directional except `CONSOLIDATION_FORMING` <-> itself while bars
/// keep extending the window; every other edge moves strictly forward or
/// lands in `Invalidated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupState {
    LseReady,
    Liq1Detected,
    ConsolidationForming,
    ConsolidationConfirmed,
    NoWickSweepFound,
    EntryArmed,
    OrderSubmitted,
    InTrade,
    Completed,
    Invalidated,
}

impl SetupState {
    /// Terminal states never accept a transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, SetupState::Completed | SetupState::Invalidated)
    }
}

/// Why a setup left the pipeline before reaching `Completed`. Replaces the
/// Python reference's informal `None`-returns and log messages with a named,
/// matchable reason every caller must handle explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    NoLseRange,
    NoLiq1Break,
    ConsolidationTooShort,
    ConsolidationTooLong,
    ConsolidationRangeOutOfBounds,
    ConsolidationTrending,
    NoWickSweepNotFound,
    EntryTriggerTimeout,
    RetracementExceeded,
    DuplicateOrder,
    BrokerGateRefused,
    TradingDisabled,
    /// `SetupClassifier::evaluate` returned SKIP while filtering was
    /// enabled (§4.8, §4.14). Shadow mode still records the prediction
    /// via `ShadowPrediction` even when filtering is off and this
    /// variant never fires.
    ClassifierFiltered,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for InvalidationReason {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    pub reason: InvalidationReason,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liq1Info {
    pub idx: usize,
    pub time: DateTime<Utc>,
    pub price: i64,
    /// The LSE high/low level that was swept.
    pub level: i64,
    pub confidence: OrderedF64,
}

/// `f64` wrapper that is `Eq`/`Ord` for storage in setup records. Values are
/// always finite scores in `[0.0, 1.0]` produced by detector code, never
/// user input, so `NaN` cannot occur here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedF64(pub f64);

impl Eq for OrderedF64 {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoWickSweep {
    /// Index shared by both the wick-sweep candle and the no-wick candle —
    /// the Python reference confirms these as the same bar.
    pub idx: usize,
    pub time: DateTime<Utc>,
    pub confidence: OrderedF64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTrigger {
    pub idx: usize,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub idx: usize,
    pub price: i64,
}

/// A fully or partially built 5/1 SLOB pattern instance, from the LSE range
/// through (at most) a completed trade. Every stage-specific field is
/// `Option` until that stage is reached; `state` is the single source of
/// truth for which fields are populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    pub id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub state: SetupState,

    pub lse_high: i64,
    pub lse_low: i64,

    pub liq1: Option<Liq1Info>,
    pub consolidation: Option<Consolidation>,
    pub sweep: Option<NoWickSweep>,
    pub entry_trigger: Option<EntryTrigger>,
    pub entry: Option<Entry>,

    pub sl_price: Option<i64>,
    pub tp_price: Option<i64>,
    /// `|entry - sl|`, in micros.
    pub risk_points: Option<i64>,
    /// `|tp - entry|`, in micros.
    pub reward_points: Option<i64>,
    pub risk_reward_ratio: Option<OrderedF64>,

    pub invalidation: Option<Invalidation>,
}

impl Setup {
    pub fn new(id: Uuid, symbol: impl Into<String>, direction: Direction, lse_high: i64, lse_low: i64) -> Self {
        Setup {
            id,
            symbol: symbol.into(),
            direction,
            state: SetupState::LseReady,
            lse_high,
            lse_low,
            liq1: None,
            consolidation: None,
            sweep: None,
            entry_trigger: None,
            entry: None,
            sl_price: None,
            tp_price: None,
            risk_points: None,
            reward_points: None,
            risk_reward_ratio: None,
            invalidation: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_setup_starts_at_lse_ready() {
        let s = Setup::new(Uuid::nil(), "NQ", Direction::Short, 21_500_000_000, 21_400_000_000);
        assert_eq!(s.state, SetupState::LseReady);
        assert!(s.is_active());
        assert!(s.liq1.is_none());
    }

    #[test]
    fn terminal_states_are_not_active() {
        let mut s = Setup::new(Uuid::nil(), "NQ", Direction::Long, 1, 0);
        s.state = SetupState::Invalidated;
        assert!(!s.is_active());
        s.state = SetupState::Completed;
        assert!(!s.is_active());
    }
}
