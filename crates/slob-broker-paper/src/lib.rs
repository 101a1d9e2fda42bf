//! Deterministic in-memory "paper" broker adapter — implements
//! `slob_execution::BrokerAdapter` with no network, no randomness, no wall
//! clock. `broker_order_id` is exactly the caller's `order_id`; submit is
//! idempotent (resubmitting the same order id returns the existing
//! snapshot unmodified); cancel is idempotent against unknown ids.
//!
//! Fills are not auto-generated here: a paper run that needs fills to
//! progress a setup calls `PaperBroker::fill` explicitly, driven by the
//! engine loop's own bar-close logic, matching how `BacktestDriver`
//! resolves exits against the same price series.

use std::collections::BTreeMap;

use slob_execution::{
    BrokerAdapter, BrokerCancelResponse, BrokerErrorEvent, BrokerSubmitRequest, BrokerSubmitResponse,
};

pub mod types;

use types::{BrokerMessageId, OrderSnapshot, OrderStatus};

#[derive(Clone, Debug)]
pub struct PaperBroker {
    connected: bool,
    balance_micros: i64,
    orders: BTreeMap<String, OrderSnapshot>,
    positions: BTreeMap<String, i64>,
}

impl PaperBroker {
    pub fn new(starting_balance_micros: i64) -> Self {
        Self {
            connected: true,
            balance_micros: starting_balance_micros,
            orders: BTreeMap::new(),
            positions: BTreeMap::new(),
        }
    }

    /// Simulates a broker disconnect for reconnect-path tests.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Deterministic listing; `BTreeMap` iteration order is stable.
    pub fn list_orders(&self) -> Vec<OrderSnapshot> {
        self.orders.values().cloned().collect()
    }

    pub fn positions(&self) -> BTreeMap<String, i64> {
        self.positions.clone()
    }

    pub fn set_position(&mut self, symbol: impl Into<String>, qty_signed: i64) {
        self.positions.insert(symbol.into(), qty_signed);
    }

    /// Applies a deterministic fill to a resting order, updating the
    /// position book. Driven externally by the engine loop, never by this
    /// broker's own clock.
    pub fn fill(&mut self, broker_order_id: &str, qty: u32) -> Option<BrokerMessageId> {
        let ord = self.orders.get_mut(broker_order_id)?;
        ord.filled_qty = ord.filled_qty.saturating_add(qty).min(ord.qty);
        let signed = match ord.direction {
            slob_schemas::Direction::Long => i64::from(qty),
            slob_schemas::Direction::Short => -i64::from(qty),
        };
        *self.positions.entry(ord.symbol.clone()).or_insert(0) += signed;
        if ord.filled_qty >= ord.qty {
            ord.status = OrderStatus::Filled;
        }
        Some(BrokerMessageId::new(format!("paper:msg:fill:{broker_order_id}")))
    }
}

impl BrokerAdapter for PaperBroker {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn submit_order(&mut self, req: &BrokerSubmitRequest) -> Result<BrokerSubmitResponse, BrokerErrorEvent> {
        if !self.connected {
            return Err(BrokerErrorEvent {
                code: 1100,
                message: "paper broker is simulating a disconnect".to_string(),
                request_id: req.order_id.clone(),
            });
        }

        if self.orders.contains_key(&req.order_id) {
            return Ok(BrokerSubmitResponse {
                broker_order_id: req.order_id.clone(),
                accepted: true,
            });
        }

        let direction = match req.side {
            slob_execution::Side::Buy => slob_schemas::Direction::Long,
            slob_execution::Side::Sell => slob_schemas::Direction::Short,
        };
        let snap = OrderSnapshot::new(req.order_id.clone(), req.symbol.clone(), direction, req.quantity);
        self.orders.insert(req.order_id.clone(), snap);

        Ok(BrokerSubmitResponse {
            broker_order_id: req.order_id.clone(),
            accepted: true,
        })
    }

    fn cancel_order(&mut self, broker_order_id: &str) -> Result<BrokerCancelResponse, BrokerErrorEvent> {
        if let Some(ord) = self.orders.get_mut(broker_order_id) {
            ord.status = OrderStatus::Cancelled;
        }
        Ok(BrokerCancelResponse {
            broker_order_id: broker_order_id.to_string(),
            accepted: true,
        })
    }

    fn account_balance_micros(&self) -> i64 {
        self.balance_micros
    }
}
