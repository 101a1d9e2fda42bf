//! `LiveTradingEngine` — the outer loop of §4.14. Drives a `BrokerGateway`'s
//! message stream (§4.13, REDESIGN FLAGS) through bar aggregation, pattern
//! detection, the setup state machine, classifier-gated risk sizing, and
//! order submission, the same `PatternFinder`/`SetupStateMachine` pipeline
//! `slob-backtest::BacktestEngine` drives from a historical `BarStore`
//! instead of a live feed.
//!
//! Deliberately synchronous: every sibling crate this engine calls directly
//! (`slob-execution`, `slob-risk`, `slob-features`, `slob-classifier`,
//! `slob-broker-paper`/`slob-broker-live`) is pure logic or blocking IO.
//! `slob-db` is async/sqlx and is never called from here — every state
//! change that needs persisting is returned as an [`EngineEvent`] for an
//! async host (`slob-cli`, `slob-daemon`) to apply.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use slob_classifier::SetupClassifier;
use slob_execution::{
    requires_reconnect, BracketLeg, BracketOrderRequest, BrokerAdapter, FillWaiter, OrderExecutor, OrderRef,
    PreSubmitRefusal, SetupEvent, SetupStateMachine, SetupTracker, SetupTransitionError,
};
use slob_features::FeatureEngineer;
use slob_patterns::PatternFinder;
use slob_risk::{RequestKind, RiskAction, RiskInput, RiskManager};
use slob_schemas::setup::{InvalidationReason, Setup, SetupState};
use slob_schemas::{Bar, BarStore, Direction, ExitReason, ShadowPrediction, Trade, TradeResult};

use crate::aggregator::BarAggregator;
use crate::session;
use crate::types::{EngineConfig, EngineEvent, GatewayMessage, OrderLookup, Tick};

/// `submit_bracket` always takes a `FillWaiter`, but every adapter this
/// engine is built against (`slob-broker-paper`, `slob-broker-live`) is
/// synchronous — a submit call that returns `Ok` already reflects the
/// broker's acceptance. The manual-fallback path is exercised only when
/// `ExecutorConfig::bracket_native` is turned off for a broker that lacks
/// atomic-bracket support, so this stand-in treats the entry as filled
/// immediately rather than blocking the single-threaded engine loop.
struct ImmediateFillWaiter;

impl FillWaiter for ImmediateFillWaiter {
    fn await_fill(&mut self, _entry_broker_id: &str, _timeout_ms: i64) -> bool {
        true
    }
}

fn drive_to_entry_armed(sm: &mut SetupStateMachine) -> Result<(), SetupTransitionError> {
    sm.apply(SetupEvent::Liq1Detected)?;
    sm.apply(SetupEvent::ConsolidationExtended)?;
    sm.apply(SetupEvent::ConsolidationConfirmed)?;
    sm.apply(SetupEvent::NoWickSweepFound)?;
    sm.apply(SetupEvent::EntryArmed)
}

fn map_refusal(refusal: PreSubmitRefusal) -> InvalidationReason {
    match refusal {
        PreSubmitRefusal::DuplicateOrder => InvalidationReason::DuplicateOrder,
        PreSubmitRefusal::TradingDisabled => InvalidationReason::TradingDisabled,
        PreSubmitRefusal::PaperModeRequired
        | PreSubmitRefusal::BrokerDisconnected
        | PreSubmitRefusal::IncompleteSetup
        | PreSubmitRefusal::InsufficientMargin => InvalidationReason::BrokerGateRefused,
    }
}

fn build_trade(setup: &Setup, qty: u32, exit_price_micros: i64, exit_time: DateTime<Utc>, exit_reason: ExitReason) -> Option<Trade> {
    let entry = setup.entry?;
    let entry_time = setup.entry_trigger.map(|t| t.time).unwrap_or(exit_time);
    let pnl_points = match setup.direction {
        Direction::Long => exit_price_micros - entry.price,
        Direction::Short => entry.price - exit_price_micros,
    };
    let pnl_cash_micros = pnl_points * i64::from(qty);
    Some(Trade {
        id: Uuid::new_v4(),
        setup_id: setup.id,
        symbol: setup.symbol.clone(),
        direction: setup.direction,
        entry_time,
        entry_price: entry.price,
        exit_time,
        exit_price: exit_price_micros,
        exit_reason,
        size: i64::from(qty),
        pnl_points,
        pnl_cash_micros,
        result: TradeResult::from_pnl_micros(pnl_cash_micros),
    })
}

/// The live engine: one instance per trading day/deployment, parameterized
/// over the broker adapter it drives.
pub struct LiveTradingEngine<B: BrokerAdapter> {
    config: EngineConfig,
    finder: PatternFinder,
    features: FeatureEngineer,
    classifier: Option<SetupClassifier>,
    tracker: SetupTracker,
    executor: OrderExecutor<B>,
    risk: RiskManager,
    aggregator: BarAggregator,
    /// Per-symbol growing bar window for the current session.
    sessions: HashMap<String, (u32, BarStore)>,
    /// (symbol, day_id) pairs that have already claimed their one setup for
    /// the session, matching `PatternFinder::scan_session`'s "at most one
    /// setup per session" contract.
    claimed_sessions: HashSet<(String, u32)>,
    order_lookup: HashMap<String, OrderLookup>,
    /// Quantity submitted for each setup's bracket — needed to compute a
    /// completed trade's P&L, since `Setup` itself carries no size field.
    quantities: HashMap<Uuid, u32>,
    reconnect_attempts: u32,
    /// Sticky once set: cleared only by restarting the engine, not by a
    /// later `Reconnected` message (§5 — existing positions are left as-is
    /// and an operator must act).
    safe_mode: bool,
}

impl<B: BrokerAdapter> LiveTradingEngine<B> {
    pub fn new(
        config: EngineConfig,
        finder: PatternFinder,
        features: FeatureEngineer,
        classifier: Option<SetupClassifier>,
        broker: B,
        initial_day_id: u32,
    ) -> Self {
        let risk = RiskManager::new(config.risk.clone(), initial_day_id, config.starting_equity_micros, 0);
        let executor = OrderExecutor::new(config.executor.clone(), broker);
        Self {
            config,
            finder,
            features,
            classifier,
            tracker: SetupTracker::new(),
            executor,
            risk,
            aggregator: BarAggregator::new(),
            sessions: HashMap::new(),
            claimed_sessions: HashSet::new(),
            order_lookup: HashMap::new(),
            quantities: HashMap::new(),
            reconnect_attempts: 0,
            safe_mode: false,
        }
    }

    pub fn is_safe_mode(&self) -> bool {
        self.safe_mode
    }

    pub fn active_setup_count(&self) -> usize {
        self.tracker.active_count()
    }

    /// Drains one message from the gateway's bounded queue, returning any
    /// events the host must persist or surface.
    pub fn handle_message(&mut self, msg: GatewayMessage) -> Vec<EngineEvent> {
        match msg {
            GatewayMessage::TickReceived(tick) => self.handle_tick(tick),
            GatewayMessage::OrderAcknowledged { .. } => Vec::new(),
            GatewayMessage::OrderFilled { broker_order_id, fill_price_micros, timestamp } => {
                self.handle_fill(&broker_order_id, fill_price_micros, timestamp)
            }
            GatewayMessage::OrderRejected { broker_order_id, code, message } => {
                self.handle_reject(&broker_order_id, code, message)
            }
            GatewayMessage::BrokerError { code, message, request_id } => self.handle_broker_error(code, message, request_id),
            GatewayMessage::Disconnected => self.note_disconnect(),
            GatewayMessage::Reconnected => {
                self.reconnect_attempts = 0;
                Vec::new()
            }
        }
    }

    fn handle_tick(&mut self, tick: Tick) -> Vec<EngineEvent> {
        let symbol = tick.symbol.clone();
        match self.aggregator.push(tick) {
            Ok(Some(bar)) => self.on_bar_closed(&symbol, bar),
            Ok(None) => Vec::new(),
            Err(e) => vec![EngineEvent::OperatorNotice { message: e.to_string() }],
        }
    }

    fn on_bar_closed(&mut self, symbol: &str, bar: Bar) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let day = session::day_id(bar.ts_close_utc);

        let slot = self
            .sessions
            .entry(symbol.to_string())
            .or_insert_with(|| (day, BarStore::new(symbol)));
        if slot.0 != day {
            *slot = (day, BarStore::new(symbol));
        }
        match slot.1.push(bar) {
            Ok(Some(_)) => {}
            // Exact-duplicate timestamp: idempotent re-delivery, dropped
            // silently per the feed contract.
            Ok(None) => return events,
            Err(e) => {
                events.push(EngineEvent::OperatorNotice {
                    message: format!("bar rejected for {symbol}: {e}"),
                });
                return events;
            }
        }

        let session_key = (symbol.to_string(), day);
        if self.claimed_sessions.contains(&session_key) {
            return events;
        }

        // Re-running `scan_session` over the growing window is the same
        // pure, idempotent walk `slob-backtest` runs once over a complete
        // session; here it simply hasn't found its levels yet on earlier
        // bars.
        let bars_slice = self.sessions.get(symbol).expect("just inserted").1.as_slice().to_vec();
        let setup = match self.finder.scan_session(symbol, &bars_slice) {
            Ok(setup) => setup,
            Err(_reason) => return events,
        };
        self.claimed_sessions.insert(session_key);

        let id = self.tracker.spawn(setup, bar.ts_close_utc.date_naive());
        let sm = self.tracker.get_mut(id).expect("just spawned");
        if let Err(e) = drive_to_entry_armed(sm) {
            events.push(EngineEvent::OperatorNotice {
                message: format!("internal setup-transition error: {e}"),
            });
            return events;
        }
        events.push(EngineEvent::SetupUpserted(sm.setup().clone()));

        events.extend(self.try_arm_entry(id, &bars_slice));
        events
    }

    fn try_arm_entry(&mut self, id: Uuid, bars: &[Bar]) -> Vec<EngineEvent> {
        let mut events = Vec::new();

        if self.safe_mode {
            self.invalidate(id, InvalidationReason::BrokerGateRefused, &mut events);
            return events;
        }

        let setup_snapshot = match self.tracker.get(id) {
            Some(sm) => sm.setup().clone(),
            None => return events,
        };

        let features = match self.features.compute(bars, 0, &setup_snapshot) {
            Ok(f) => f,
            Err(e) => {
                events.push(EngineEvent::OperatorNotice {
                    message: format!("feature computation failed for {}: {e:?}", setup_snapshot.id),
                });
                self.invalidate(id, InvalidationReason::EntryTriggerTimeout, &mut events);
                return events;
            }
        };

        if let Some(classifier) = &self.classifier {
            let ml_probability = classifier.predict_proba(&features);
            let ml_decision = classifier.evaluate(&features);
            events.push(EngineEvent::ShadowPredictionRecorded(ShadowPrediction {
                id: Uuid::new_v4(),
                setup_id: id,
                created_at: Utc::now(),
                ml_probability,
                ml_decision,
                // The setup reached `EntryArmed` by passing every rule-based
                // gate, so the rule-only baseline always says TAKE here.
                rule_decision: true,
                actual_outcome: None,
                actual_pnl_micros: None,
            }));

            if self.config.classifier_filtering_enabled && !ml_decision {
                self.invalidate(id, InvalidationReason::ClassifierFiltered, &mut events);
                return events;
            }
        }

        let risk_input = RiskInput {
            day_id: self.risk.state.day_id,
            equity_micros: self.risk.state.current_equity_micros,
            reject_window_id: self.risk.state.reject_window_id,
            request: RequestKind::NewOrder,
            is_risk_reducing: self.risk.state.risk_reduction_active,
            kill_switch: None,
        };
        if self.risk.evaluate(&risk_input).action != RiskAction::Allow {
            self.invalidate(id, InvalidationReason::TradingDisabled, &mut events);
            return events;
        }

        let (entry_price, sl_price, tp_price, direction) = match (setup_snapshot.entry, setup_snapshot.sl_price, setup_snapshot.tp_price) {
            (Some(entry), Some(sl), Some(tp)) => (entry.price, sl, tp, setup_snapshot.direction),
            _ => {
                self.invalidate(id, InvalidationReason::EntryTriggerTimeout, &mut events);
                return events;
            }
        };

        let stop_distance = (entry_price - sl_price).abs();
        // Trade-history-aware half-Kelly sizing is left for a future pass
        // (§ pending: live trade-outcome feed into `slob-risk::size`); an
        // empty history falls back to fixed-fractional, same as backtest.
        let size_decision = self.risk.size(stop_distance, None, &[]);
        if size_decision.quantity == 0 {
            self.invalidate(id, InvalidationReason::TradingDisabled, &mut events);
            return events;
        }

        let req = BracketOrderRequest {
            setup_id: id,
            symbol: setup_snapshot.symbol.clone(),
            direction,
            quantity: size_decision.quantity,
            entry_price_micros: entry_price,
            sl_price_micros: sl_price,
            tp_price_micros: tp_price,
        };
        let order_ref = OrderRef::new(id, Utc::now());
        let mut waiter = ImmediateFillWaiter;

        match self.executor.submit_bracket(&req, order_ref, self.config.request_is_live, &mut waiter) {
            Ok(submission) => {
                self.order_lookup.insert(submission.entry_broker_id.clone(), OrderLookup { setup_id: id, leg: BracketLeg::Entry });
                self.order_lookup.insert(submission.sl_broker_id.clone(), OrderLookup { setup_id: id, leg: BracketLeg::StopLoss });
                self.order_lookup.insert(submission.tp_broker_id.clone(), OrderLookup { setup_id: id, leg: BracketLeg::TakeProfit });
                self.quantities.insert(id, size_decision.quantity);

                if let Some(sm) = self.tracker.get_mut(id) {
                    match sm.apply(SetupEvent::OrderSubmitted) {
                        Ok(()) => events.push(EngineEvent::SetupUpserted(sm.setup().clone())),
                        Err(e) => events.push(EngineEvent::OperatorNotice { message: format!("{e}") }),
                    }
                }
            }
            Err(refusal) => {
                let reason = map_refusal(refusal);
                self.invalidate(id, reason, &mut events);
            }
        }

        events
    }

    fn invalidate(&mut self, id: Uuid, reason: InvalidationReason, events: &mut Vec<EngineEvent>) {
        if let Some(sm) = self.tracker.get_mut(id) {
            let _ = sm.invalidate(reason, Utc::now());
            events.push(EngineEvent::SetupUpserted(sm.setup().clone()));
        }
        events.push(EngineEvent::SetupInvalidated { setup_id: id, reason });
        self.tracker.evict_terminal();
        self.order_lookup.retain(|_, l| l.setup_id != id);
        self.quantities.remove(&id);
    }

    fn handle_fill(&mut self, broker_order_id: &str, fill_price_micros: i64, timestamp: DateTime<Utc>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let lookup = match self.order_lookup.get(broker_order_id).copied() {
            Some(l) => l,
            None => {
                events.push(EngineEvent::OperatorNotice {
                    message: format!("fill for unknown broker order id {broker_order_id}"),
                });
                return events;
            }
        };

        match lookup.leg {
            BracketLeg::Entry => {
                if let Some(sm) = self.tracker.get_mut(lookup.setup_id) {
                    match sm.apply(SetupEvent::Filled) {
                        Ok(()) => events.push(EngineEvent::SetupUpserted(sm.setup().clone())),
                        Err(e) => events.push(EngineEvent::OperatorNotice { message: format!("{e}") }),
                    }
                }
            }
            BracketLeg::StopLoss | BracketLeg::TakeProfit => {
                let exit_reason = if matches!(lookup.leg, BracketLeg::StopLoss) {
                    ExitReason::StopLoss
                } else {
                    ExitReason::TakeProfit
                };
                if let Some(sm) = self.tracker.get_mut(lookup.setup_id) {
                    match sm.apply(SetupEvent::Completed) {
                        Ok(()) => {
                            let setup = sm.setup().clone();
                            let qty = self.quantities.get(&lookup.setup_id).copied().unwrap_or(0);
                            if let Some(trade) = build_trade(&setup, qty, fill_price_micros, timestamp, exit_reason) {
                                events.push(EngineEvent::TradeCompleted(trade));
                            }
                            events.push(EngineEvent::SetupUpserted(setup));
                        }
                        Err(e) => events.push(EngineEvent::OperatorNotice { message: format!("{e}") }),
                    }
                }
                self.tracker.evict_terminal();
                self.quantities.remove(&lookup.setup_id);
                // The sibling SL/TP leg is auto-cancelled broker-side via
                // the shared OCA group; drop every lookup entry for this
                // setup so a late message for it can't misroute.
                self.order_lookup.retain(|_, l| l.setup_id != lookup.setup_id);
            }
        }

        events
    }

    fn handle_reject(&mut self, broker_order_id: &str, code: i32, message: String) -> Vec<EngineEvent> {
        let mut events = vec![EngineEvent::OperatorNotice {
            message: format!("order {broker_order_id} rejected: {code} {message}"),
        }];

        if let Some(lookup) = self.order_lookup.get(broker_order_id).copied() {
            if matches!(lookup.leg, BracketLeg::Entry) {
                self.invalidate(lookup.setup_id, InvalidationReason::BrokerGateRefused, &mut events);
            } else {
                self.order_lookup.retain(|_, l| l.setup_id != lookup.setup_id);
            }
        }

        if requires_reconnect(code) {
            events.extend(self.note_disconnect());
        }
        events
    }

    fn handle_broker_error(&mut self, code: i32, message: String, request_id: String) -> Vec<EngineEvent> {
        let mut events = vec![EngineEvent::OperatorNotice {
            message: format!("broker error {code} ({request_id}): {message}"),
        }];
        if requires_reconnect(code) {
            events.extend(self.note_disconnect());
        }
        events
    }

    /// §5: reconnect has a hard ceiling before the engine enters safe mode
    /// (no new orders, existing positions untouched, operator notified).
    /// Sticky once entered — see the `safe_mode` field doc.
    fn note_disconnect(&mut self) -> Vec<EngineEvent> {
        self.reconnect_attempts += 1;
        if !self.safe_mode && self.reconnect_attempts >= self.config.reconnect.max_attempts {
            self.safe_mode = true;
            return vec![EngineEvent::SafeModeEntered {
                message: format!(
                    "reconnect ceiling ({}) exceeded; no new orders will be submitted",
                    self.config.reconnect.max_attempts
                ),
            }];
        }
        Vec::new()
    }

    /// §5 shutdown drain: stop accepting bars (the caller simply stops
    /// feeding `TickReceived`), cancel resting entry orders per config,
    /// persist final state for every still-active setup, release the
    /// gateway (the caller's responsibility once this returns).
    pub fn shutdown(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let active_ids: Vec<Uuid> = self.tracker.active_ids().collect();

        for id in active_ids {
            let state = match self.tracker.get(id) {
                Some(sm) => sm.state(),
                None => continue,
            };

            if state == SetupState::OrderSubmitted && self.config.cancel_resting_orders_on_shutdown {
                let entry_broker_id = self
                    .order_lookup
                    .iter()
                    .find(|(_, l)| l.setup_id == id && matches!(l.leg, BracketLeg::Entry))
                    .map(|(broker_id, _)| broker_id.clone());

                if let Some(broker_id) = entry_broker_id {
                    if let Err(e) = self.executor.cancel(&broker_id) {
                        events.push(EngineEvent::OperatorNotice {
                            message: format!("failed to cancel resting order {broker_id}: {}", e.message),
                        });
                    }
                }
            }

            if let Some(sm) = self.tracker.get(id) {
                events.push(EngineEvent::SetupUpserted(sm.setup().clone()));
            }
        }

        events
    }
}
