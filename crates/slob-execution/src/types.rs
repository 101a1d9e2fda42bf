//! Bracket-order request/refusal/config types for a single 5/1 SLOB setup.

use slob_schemas::Direction;
use uuid::Uuid;

/// One of the three linked legs of a bracket order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BracketLeg {
    Entry,
    StopLoss,
    TakeProfit,
}

impl BracketLeg {
    fn suffix(self) -> &'static str {
        match self {
            BracketLeg::Entry => "ENTRY",
            BracketLeg::StopLoss => "SL",
            BracketLeg::TakeProfit => "TP",
        }
    }
}

/// Derives the deterministic order-reference tag for a setup's bracket
/// group (bit-exact per the order-reference contract):
/// `SLOB_{setup_id_first_8}_{YYYYMMDD}_{HHMMSS}_{ENTRY|SL|TP}`. The same
/// `OrderRef` is reused for every leg of one bracket so a duplicate-order
/// scan can recognize all three by their shared `SLOB_{prefix}` prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRef {
    pub setup_id: Uuid,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

impl OrderRef {
    pub fn new(setup_id: Uuid, submitted_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self { setup_id, submitted_at }
    }

    pub fn prefix(&self) -> String {
        let short = self.setup_id.simple().to_string();
        format!(
            "SLOB_{}_{}_{}",
            &short[..8.min(short.len())],
            self.submitted_at.format("%Y%m%d"),
            self.submitted_at.format("%H%M%S")
        )
    }

    pub fn tag(&self, leg: BracketLeg) -> String {
        format!("{}_{}", self.prefix(), leg.suffix())
    }
}

/// Buy/sell side derived from a setup's direction: LONG enters buying and
/// exits (SL/TP) selling; SHORT is the mirror.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn entry_side(direction: Direction) -> Self {
        match direction {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    pub fn exit_side(direction: Direction) -> Self {
        match Self::entry_side(direction) {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A fully-specified bracket order request: entry + stop-loss +
/// take-profit, all three computed by `slob-patterns`/`slob-risk` before
/// reaching this crate. Prices are integer micros (`slob_schemas::prices`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BracketOrderRequest {
    pub setup_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub quantity: u32,
    pub entry_price_micros: i64,
    pub sl_price_micros: i64,
    pub tp_price_micros: i64,
}

/// The six pre-submission refusal reasons, checked in order (§4.12).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PreSubmitRefusal {
    PaperModeRequired,
    TradingDisabled,
    BrokerDisconnected,
    IncompleteSetup,
    DuplicateOrder,
    InsufficientMargin,
}

impl std::fmt::Display for PreSubmitRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            PreSubmitRefusal::PaperModeRequired => "paper_trading mode required but request is live",
            PreSubmitRefusal::TradingDisabled => "trading_enabled is false",
            PreSubmitRefusal::BrokerDisconnected => "broker connection is not healthy",
            PreSubmitRefusal::IncompleteSetup => "setup is missing entry/sl/tp",
            PreSubmitRefusal::DuplicateOrder => "a bracket with this order-reference prefix already exists",
            PreSubmitRefusal::InsufficientMargin => "estimated margin exceeds available account balance",
        };
        write!(f, "PRESUBMIT_REFUSED: {msg}")
    }
}

impl std::error::Error for PreSubmitRefusal {}

#[derive(Clone, Debug, PartialEq)]
pub struct ExecutorConfig {
    pub paper_trading_only: bool,
    pub trading_enabled: bool,
    pub bracket_native: bool,
    /// Fraction of notional value held as estimated margin (default 20%).
    pub margin_requirement_pct: f64,
    pub manual_fallback_entry_timeout_ms: i64,
    pub retry_max_attempts: u32,
    pub retry_base_backoff_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            paper_trading_only: true,
            trading_enabled: true,
            bracket_native: true,
            margin_requirement_pct: 0.20,
            manual_fallback_entry_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_base_backoff_ms: 500,
        }
    }
}
