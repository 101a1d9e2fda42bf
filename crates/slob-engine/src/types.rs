use chrono::{DateTime, Utc};
use uuid::Uuid;

use slob_execution::{BracketLeg, ExecutorConfig};
use slob_broker_live::ReconnectPolicy;
use slob_risk::RiskConfig;
use slob_schemas::setup::{InvalidationReason, Setup};
use slob_schemas::{ShadowPrediction, Trade};

/// One trade tick from the broker's market-data feed. Aggregation into
/// minute bars (§4.13 — "tick -> bar aggregation is the gateway's
/// responsibility") happens in [`crate::aggregator::BarAggregator`].
#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub price_micros: i64,
    pub size: i64,
    pub timestamp: DateTime<Utc>,
}

/// Message variants a `BrokerGateway` pushes onto the bounded queue the
/// engine loop pulls from (REDESIGN FLAGS: "Coroutines / event callbacks for
/// broker events -> a single bounded message queue ... with a small enum of
/// message variants"). The gateway never mutates engine state directly.
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayMessage {
    TickReceived(Tick),
    OrderAcknowledged { broker_order_id: String },
    OrderFilled { broker_order_id: String, fill_price_micros: i64, timestamp: DateTime<Utc> },
    OrderRejected { broker_order_id: String, code: i32, message: String },
    BrokerError { code: i32, message: String, request_id: String },
    Disconnected,
    Reconnected,
}

/// Wiring/policy knobs the live engine needs at construction time. Anything
/// the engine can instead derive from an incoming message or an already-built
/// sibling crate's config (`ExecutorConfig`, `RiskConfig`) is composed in
/// rather than duplicated here.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub executor: ExecutorConfig,
    pub risk: RiskConfig,
    /// §5: broker reconnect has a hard ceiling before the engine enters
    /// safe mode. Reused verbatim from the live broker adapter's own policy
    /// type so the two "how many attempts before giving up" knobs can't
    /// drift apart.
    pub reconnect: ReconnectPolicy,
    /// §4.8/§4.14: when false, `SetupClassifier` still scores and records a
    /// shadow prediction for every `EntryArmed` setup, but never blocks
    /// order submission.
    pub classifier_filtering_enabled: bool,
    /// §4.12: whether outgoing bracket requests are live-account requests
    /// (as opposed to paper). Checked against `executor.paper_trading_only`
    /// on every submission.
    pub request_is_live: bool,
    /// §5 shutdown: cancel resting (unfilled) entry orders during drain.
    pub cancel_resting_orders_on_shutdown: bool,
    pub starting_equity_micros: i64,
}

/// Output of one `handle_message`/`shutdown` call: state the engine's own
/// synchronous core cannot persist itself (`slob-db` is async) but an async
/// host (`slob-cli`, `slob-daemon`) must act on.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// A setup's state changed; the host should upsert the latest snapshot.
    SetupUpserted(Setup),
    /// Recorded regardless of whether classifier filtering is enabled.
    ShadowPredictionRecorded(ShadowPrediction),
    /// A setup reached `Completed`; the host should persist the trade row.
    TradeCompleted(Trade),
    /// A setup left the pipeline before completion.
    SetupInvalidated { setup_id: Uuid, reason: InvalidationReason },
    /// Broker reconnect exhausted its ceiling (§5): no new orders, existing
    /// positions left as-is, operator notified.
    SafeModeEntered { message: String },
    /// Non-fatal, operator-facing notice (rejected order, broker warning).
    OperatorNotice { message: String },
}

/// One resolved broker leg, kept so `OrderFilled`/`OrderRejected` messages
/// (which carry only a `broker_order_id`) can be routed back to the setup
/// and leg that produced them. `BrokerOrderMap` in `slob-execution` only
/// supports the forward (internal id -> broker id) direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderLookup {
    pub setup_id: Uuid,
    pub leg: BracketLeg,
}
