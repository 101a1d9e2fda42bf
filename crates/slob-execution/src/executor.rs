//! `OrderExecutor` — turns a risk-sized bracket order into broker submissions
//! (§4.12). Runs six ordered pre-submission checks, then either an atomic
//! bracket (parent `transmit=false`, last child `transmit=true`) or, for
//! brokers without native bracket support, a manual fallback: submit entry,
//! await fill within a bounded timeout, then submit SL/TP — cancelling entry
//! on timeout.

use std::collections::{HashMap, HashSet};
use std::thread::sleep;
use std::time::Duration;

use crate::broker::{disables_trading, BrokerAdapter, BrokerErrorEvent, BrokerSubmitRequest, OrderRouter};
use crate::oms::state_machine::OmsOrder;
use crate::types::{BracketLeg, BracketOrderRequest, ExecutorConfig, OrderRef, PreSubmitRefusal, Side};
use crate::BrokerOrderMap;

#[derive(Clone, Debug, PartialEq)]
pub struct BracketSubmission {
    pub entry_broker_id: String,
    pub sl_broker_id: String,
    pub tp_broker_id: String,
    pub manual_fallback_used: bool,
}

/// Bounded-timeout fill observation for manual-fallback mode. Real
/// implementations poll the broker gateway's order-state stream;
/// tests supply a deterministic stand-in.
pub trait FillWaiter {
    fn await_fill(&mut self, entry_broker_id: &str, timeout_ms: i64) -> bool;
}

pub struct OrderExecutor<B: BrokerAdapter> {
    config: ExecutorConfig,
    router: OrderRouter<B>,
    id_map: BrokerOrderMap,
    legs: HashMap<String, OmsOrder>,
    open_prefixes: HashSet<String>,
}

impl<B: BrokerAdapter> OrderExecutor<B> {
    pub fn new(config: ExecutorConfig, broker: B) -> Self {
        Self {
            config,
            router: OrderRouter::new(broker),
            id_map: BrokerOrderMap::new(),
            legs: HashMap::new(),
            open_prefixes: HashSet::new(),
        }
    }

    pub fn is_trading_enabled(&self) -> bool {
        self.config.trading_enabled
    }

    fn check_presubmit(&self, req: &BracketOrderRequest, order_ref: &OrderRef, request_is_live: bool) -> Result<(), PreSubmitRefusal> {
        if self.config.paper_trading_only && request_is_live {
            return Err(PreSubmitRefusal::PaperModeRequired);
        }
        if !self.config.trading_enabled {
            return Err(PreSubmitRefusal::TradingDisabled);
        }
        if !self.router.is_connected() {
            return Err(PreSubmitRefusal::BrokerDisconnected);
        }
        if req.entry_price_micros <= 0 || req.sl_price_micros <= 0 || req.tp_price_micros <= 0 || req.quantity == 0 {
            return Err(PreSubmitRefusal::IncompleteSetup);
        }
        if self.open_prefixes.contains(&order_ref.prefix()) {
            return Err(PreSubmitRefusal::DuplicateOrder);
        }
        let notional_micros = req.entry_price_micros.saturating_mul(i64::from(req.quantity));
        let margin_required = (notional_micros as f64 * self.config.margin_requirement_pct) as i64;
        if margin_required > self.router.account_balance_micros() {
            return Err(PreSubmitRefusal::InsufficientMargin);
        }
        Ok(())
    }

    fn leg_request(
        &self,
        req: &BracketOrderRequest,
        order_ref: &OrderRef,
        leg: BracketLeg,
        price_micros: i64,
        transmit: bool,
        parent_order_id: Option<String>,
    ) -> BrokerSubmitRequest {
        let side = match leg {
            BracketLeg::Entry => Side::entry_side(req.direction),
            BracketLeg::StopLoss | BracketLeg::TakeProfit => Side::exit_side(req.direction),
        };
        BrokerSubmitRequest {
            order_id: order_ref.tag(leg),
            symbol: req.symbol.clone(),
            side,
            quantity: req.quantity,
            order_type: if matches!(leg, BracketLeg::Entry) { "LMT".to_string() } else { "STP_LMT".to_string() },
            limit_price: Some(price_micros as f64 / slob_schemas::MICROS_PER_POINT as f64),
            time_in_force: "DAY".to_string(),
            transmit,
            parent_order_id,
            oca_group: Some(order_ref.prefix()),
        }
    }

    fn submit_with_retry(&mut self, req: &BrokerSubmitRequest) -> Result<String, BrokerErrorEvent> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.router.submit(req) {
                Ok(resp) => {
                    self.id_map.register(req.order_id.clone(), resp.broker_order_id.clone());
                    return Ok(resp.broker_order_id);
                }
                Err(err) => {
                    if disables_trading(err.code) {
                        self.config.trading_enabled = false;
                        return Err(err);
                    }
                    if attempt >= self.config.retry_max_attempts {
                        return Err(err);
                    }
                    let backoff = self.config.retry_base_backoff_ms * 2u64.pow(attempt - 1);
                    sleep(Duration::from_millis(backoff));
                }
            }
        }
    }

    /// Submits an atomic bracket (entry+SL+TP as one OCA group) or, when the
    /// adapter lacks native bracket support, falls back to sequential manual
    /// submission with a bounded await-fill and entry cancel-on-timeout.
    pub fn submit_bracket(
        &mut self,
        req: &BracketOrderRequest,
        order_ref: OrderRef,
        request_is_live: bool,
        waiter: &mut dyn FillWaiter,
    ) -> Result<BracketSubmission, PreSubmitRefusal> {
        self.check_presubmit(req, &order_ref, request_is_live)?;
        self.open_prefixes.insert(order_ref.prefix());

        if self.config.bracket_native {
            self.submit_atomic(req, &order_ref)
        } else {
            self.submit_manual_fallback(req, &order_ref, waiter)
        }
    }

    fn submit_atomic(&mut self, req: &BracketOrderRequest, order_ref: &OrderRef) -> Result<BracketSubmission, PreSubmitRefusal> {
        let entry_req = self.leg_request(req, order_ref, BracketLeg::Entry, req.entry_price_micros, false, None);
        let entry_id = self.submit_with_retry(&entry_req).map_err(broker_err_to_refusal)?;

        let sl_req = self.leg_request(req, order_ref, BracketLeg::StopLoss, req.sl_price_micros, false, Some(entry_id.clone()));
        let sl_id = self.submit_with_retry(&sl_req).map_err(broker_err_to_refusal)?;

        let tp_req = self.leg_request(req, order_ref, BracketLeg::TakeProfit, req.tp_price_micros, true, Some(entry_id.clone()));
        let tp_id = self.submit_with_retry(&tp_req).map_err(broker_err_to_refusal)?;

        self.track_leg(order_ref.tag(BracketLeg::Entry), &entry_id, req);
        self.track_leg(order_ref.tag(BracketLeg::StopLoss), &sl_id, req);
        self.track_leg(order_ref.tag(BracketLeg::TakeProfit), &tp_id, req);

        Ok(BracketSubmission {
            entry_broker_id: entry_id,
            sl_broker_id: sl_id,
            tp_broker_id: tp_id,
            manual_fallback_used: false,
        })
    }

    fn submit_manual_fallback(
        &mut self,
        req: &BracketOrderRequest,
        order_ref: &OrderRef,
        waiter: &mut dyn FillWaiter,
    ) -> Result<BracketSubmission, PreSubmitRefusal> {
        let entry_req = self.leg_request(req, order_ref, BracketLeg::Entry, req.entry_price_micros, true, None);
        let entry_id = self.submit_with_retry(&entry_req).map_err(broker_err_to_refusal)?;
        self.track_leg(order_ref.tag(BracketLeg::Entry), &entry_id, req);

        if !waiter.await_fill(&entry_id, self.config.manual_fallback_entry_timeout_ms) {
            let _ = self.router.cancel(&entry_id);
            self.open_prefixes.remove(&order_ref.prefix());
            return Err(PreSubmitRefusal::IncompleteSetup);
        }

        let sl_req = self.leg_request(req, order_ref, BracketLeg::StopLoss, req.sl_price_micros, true, Some(entry_id.clone()));
        let sl_id = self.submit_with_retry(&sl_req).map_err(broker_err_to_refusal)?;

        let tp_req = self.leg_request(req, order_ref, BracketLeg::TakeProfit, req.tp_price_micros, true, Some(entry_id.clone()));
        let tp_id = self.submit_with_retry(&tp_req).map_err(broker_err_to_refusal)?;

        self.track_leg(order_ref.tag(BracketLeg::StopLoss), &sl_id, req);
        self.track_leg(order_ref.tag(BracketLeg::TakeProfit), &tp_id, req);

        Ok(BracketSubmission {
            entry_broker_id: entry_id,
            sl_broker_id: sl_id,
            tp_broker_id: tp_id,
            manual_fallback_used: true,
        })
    }

    fn track_leg(&mut self, tag: String, broker_id: &str, req: &BracketOrderRequest) {
        self.legs.insert(
            broker_id.to_string(),
            OmsOrder::new(tag, req.symbol.clone(), i64::from(req.quantity)),
        );
    }

    pub fn leg_state(&self, broker_id: &str) -> Option<&OmsOrder> {
        self.legs.get(broker_id)
    }

    /// Cancels a single resting leg by its broker order id. Used by the
    /// live engine's shutdown drain (§5) to pull resting entry orders
    /// before disconnecting the gateway.
    pub fn cancel(&mut self, broker_id: &str) -> Result<(), BrokerErrorEvent> {
        self.router.cancel(broker_id)?;
        Ok(())
    }
}

fn broker_err_to_refusal(_err: BrokerErrorEvent) -> PreSubmitRefusal {
    // Broker-level submit failure after exhausting retries is reported
    // through the same refusal channel as a pre-submission refusal so
    // callers have one error type to handle.
    PreSubmitRefusal::BrokerDisconnected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::test_support::MockBroker;
    use slob_schemas::Direction;
    use uuid::Uuid;

    struct AlwaysFilled;
    impl FillWaiter for AlwaysFilled {
        fn await_fill(&mut self, _entry_broker_id: &str, _timeout_ms: i64) -> bool {
            true
        }
    }

    struct NeverFilled;
    impl FillWaiter for NeverFilled {
        fn await_fill(&mut self, _entry_broker_id: &str, _timeout_ms: i64) -> bool {
            false
        }
    }

    fn bracket_req() -> BracketOrderRequest {
        BracketOrderRequest {
            setup_id: Uuid::nil(),
            symbol: "ESU6".to_string(),
            direction: Direction::Long,
            quantity: 1,
            entry_price_micros: 5_000_000_000,
            sl_price_micros: 4_990_000_000,
            tp_price_micros: 5_010_000_000,
        }
    }

    fn order_ref() -> OrderRef {
        OrderRef::new(Uuid::nil(), chrono::Utc::now())
    }

    fn fast_cfg() -> ExecutorConfig {
        let mut c = ExecutorConfig::default();
        c.retry_base_backoff_ms = 1;
        c
    }

    #[test]
    fn atomic_bracket_submits_entry_sl_tp_with_correct_transmit_flags() {
        let broker = MockBroker::connected_with_balance(1_000_000_000_000);
        let mut exec = OrderExecutor::new(fast_cfg(), broker);
        let mut waiter = AlwaysFilled;
        let result = exec.submit_bracket(&bracket_req(), order_ref(), false, &mut waiter).unwrap();
        assert!(!result.manual_fallback_used);
        assert_ne!(result.entry_broker_id, result.sl_broker_id);
        assert_ne!(result.sl_broker_id, result.tp_broker_id);
    }

    #[test]
    fn paper_mode_required_refuses_a_live_request_in_paper_only_config() {
        let broker = MockBroker::connected_with_balance(1_000_000_000_000);
        let mut exec = OrderExecutor::new(fast_cfg(), broker);
        let mut waiter = AlwaysFilled;
        let err = exec.submit_bracket(&bracket_req(), order_ref(), true, &mut waiter).unwrap_err();
        assert_eq!(err, PreSubmitRefusal::PaperModeRequired);
    }

    #[test]
    fn disconnected_broker_refuses_before_any_submission() {
        let broker = MockBroker::default(); // connected: false
        let mut exec = OrderExecutor::new(fast_cfg(), broker);
        let mut waiter = AlwaysFilled;
        let err = exec.submit_bracket(&bracket_req(), order_ref(), false, &mut waiter).unwrap_err();
        assert_eq!(err, PreSubmitRefusal::BrokerDisconnected);
    }

    #[test]
    fn insufficient_margin_is_refused() {
        let broker = MockBroker::connected_with_balance(1);
        let mut exec = OrderExecutor::new(fast_cfg(), broker);
        let mut waiter = AlwaysFilled;
        let err = exec.submit_bracket(&bracket_req(), order_ref(), false, &mut waiter).unwrap_err();
        assert_eq!(err, PreSubmitRefusal::InsufficientMargin);
    }

    #[test]
    fn duplicate_order_ref_is_refused_on_a_second_submission() {
        let broker = MockBroker::connected_with_balance(1_000_000_000_000);
        let mut exec = OrderExecutor::new(fast_cfg(), broker);
        let oref = order_ref();
        let mut waiter = AlwaysFilled;
        exec.submit_bracket(&bracket_req(), oref.clone(), false, &mut waiter).unwrap();
        let err = exec.submit_bracket(&bracket_req(), oref, false, &mut waiter).unwrap_err();
        assert_eq!(err, PreSubmitRefusal::DuplicateOrder);
    }

    /// Mirrors the "duplicate-order protection" scenario: a second
    /// submit_bracket for the same setup while the first is still resting
    /// is refused, and the broker never sees the refused attempt's orders.
    /// `MockBroker` hands out broker ids from a strictly increasing
    /// counter, so a fresh (non-duplicate) bracket right after the refusal
    /// continuing at `BRK4` — not `BRK6`/`BRK7` — is proof the duplicate
    /// never reached the broker: exactly three orders (entry/sl/tp) were
    /// submitted in total before it.
    #[test]
    fn duplicate_order_ref_is_refused_and_broker_receives_exactly_three_orders() {
        let broker = MockBroker::connected_with_balance(1_000_000_000_000);
        let mut exec = OrderExecutor::new(fast_cfg(), broker);
        let oref = order_ref();
        let mut waiter = AlwaysFilled;

        let first = exec.submit_bracket(&bracket_req(), oref.clone(), false, &mut waiter).unwrap();
        assert_eq!(first.entry_broker_id, "BRK1");
        assert_eq!(first.sl_broker_id, "BRK2");
        assert_eq!(first.tp_broker_id, "BRK3");

        let err = exec.submit_bracket(&bracket_req(), oref, false, &mut waiter).unwrap_err();
        assert_eq!(err, PreSubmitRefusal::DuplicateOrder);

        let fresh_ref = OrderRef::new(Uuid::new_v4(), chrono::Utc::now());
        let next = exec.submit_bracket(&bracket_req(), fresh_ref, false, &mut waiter).unwrap();
        assert_eq!(next.entry_broker_id, "BRK4");
        assert_eq!(next.sl_broker_id, "BRK5");
        assert_eq!(next.tp_broker_id, "BRK6");
    }

    #[test]
    fn manual_fallback_cancels_entry_when_fill_times_out() {
        let mut cfg = fast_cfg();
        cfg.bracket_native = false;
        let broker = MockBroker::connected_with_balance(1_000_000_000_000);
        let mut exec = OrderExecutor::new(cfg, broker);
        let mut waiter = NeverFilled;
        let err = exec.submit_bracket(&bracket_req(), order_ref(), false, &mut waiter).unwrap_err();
        assert_eq!(err, PreSubmitRefusal::IncompleteSetup);
    }

    #[test]
    fn manual_fallback_submits_sl_and_tp_after_entry_fills() {
        let mut cfg = fast_cfg();
        cfg.bracket_native = false;
        let broker = MockBroker::connected_with_balance(1_000_000_000_000);
        let mut exec = OrderExecutor::new(cfg, broker);
        let mut waiter = AlwaysFilled;
        let result = exec.submit_bracket(&bracket_req(), order_ref(), false, &mut waiter).unwrap();
        assert!(result.manual_fallback_used);
    }

    #[test]
    fn trading_disabled_refuses_before_touching_the_broker() {
        let mut cfg = fast_cfg();
        cfg.trading_enabled = false;
        let broker = MockBroker::connected_with_balance(1_000_000_000_000);
        let mut exec = OrderExecutor::new(cfg, broker);
        let mut waiter = AlwaysFilled;
        let err = exec.submit_bracket(&bracket_req(), order_ref(), false, &mut waiter).unwrap_err();
        assert_eq!(err, PreSubmitRefusal::TradingDisabled);
    }

    #[test]
    fn incomplete_setup_is_refused_when_a_leg_price_is_zero() {
        let mut req = bracket_req();
        req.tp_price_micros = 0;
        let broker = MockBroker::connected_with_balance(1_000_000_000_000);
        let mut exec = OrderExecutor::new(fast_cfg(), broker);
        let mut waiter = AlwaysFilled;
        let err = exec.submit_bracket(&req, order_ref(), false, &mut waiter).unwrap_err();
        assert_eq!(err, PreSubmitRefusal::IncompleteSetup);
    }
}
